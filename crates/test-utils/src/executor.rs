//! Scripted in-memory request executors.

use async_trait::async_trait;
use loadgen_core::{ExecutorResponse, HttpRequest, RequestExecutor, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

type Responder = Box<dyn Fn(&HttpRequest) -> Result<ExecutorResponse, TransportError> + Send + Sync>;

/// A [`RequestExecutor`] that answers from a closure instead of the network.
///
/// Counts started and completed requests so tests can check that no request
/// was abandoned mid-flight.
pub struct ScriptedExecutor {
    responder: Responder,
    delay: Duration,
    hang: bool,
    started: AtomicUsize,
    completed: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedExecutor {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<ExecutorResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            hang: false,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `status` and an empty body.
    pub fn with_status(status: u16) -> Self {
        Self::new(move |_| Ok(ExecutorResponse::new(status, Vec::new(), Duration::from_millis(1))))
    }

    /// Fail every request with the given transport error.
    pub fn failing(error: TransportError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    /// Never answer. Used to exercise drain timeouts.
    pub fn hanging() -> Self {
        let mut exec = Self::with_status(200);
        exec.hang = true;
        exec
    }

    /// Simulated network latency, applied with `tokio::time::sleep`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        request: &HttpRequest,
        _timeout: Duration,
    ) -> Result<ExecutorResponse, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if self.hang {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = (self.responder)(request);
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadgen_core::TransportErrorKind;

    #[tokio::test]
    async fn test_with_status_counts_requests() {
        let exec = ScriptedExecutor::with_status(404);
        let resp = exec
            .execute(&HttpRequest::get("/products/x"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(exec.started(), 1);
        assert_eq!(exec.completed(), 1);
        assert_eq!(exec.requests()[0].path, "/products/x");
    }

    #[tokio::test]
    async fn test_failing_returns_error() {
        let err = TransportError::new(TransportErrorKind::Connect, "refused", Duration::ZERO);
        let exec = ScriptedExecutor::failing(err.clone());
        let got = exec
            .execute(&HttpRequest::get("/"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(got, err);
    }
}
