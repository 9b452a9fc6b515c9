//! Request execution against the target service.
//!
//! The engine only depends on the [`RequestExecutor`] trait. [`HttpExecutor`]
//! is the reqwest-backed implementation used by real runs; tests substitute
//! scripted executors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::error::LoadResult;
use crate::intent::{HttpMethod, HttpRequest};

/// Transport-level result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub latency: Duration,
}

impl ExecutorResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>, latency: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            latency,
        }
    }

    /// Parse the body as JSON, `None` if it is empty or malformed.
    pub fn json(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Request => "request failed",
            TransportErrorKind::Body => "body read failed",
        };
        f.write_str(s)
    }
}

/// Network-level failure: connection refused, DNS, timeout, truncated body.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
    pub latency: Duration,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>, latency: Duration) -> Self {
        Self {
            kind,
            detail: detail.into(),
            latency,
        }
    }

    fn from_reqwest(err: &reqwest::Error, fallback: TransportErrorKind, latency: Duration) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            fallback
        };
        Self::new(kind, err.to_string(), latency)
    }
}

/// Sends one request and reports status, body and latency.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<ExecutorResponse, TransportError>;
}

/// reqwest-backed executor resolving request paths against a base URL.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    /// Create an executor with a connection pool sized for `max_idle_per_host`.
    pub fn new(base_url: impl Into<String>, max_idle_per_host: usize) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(max_idle_per_host)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<ExecutorResponse, TransportError> {
        let start = Instant::now();

        let mut builder = self
            .client
            .request(reqwest_method(request.method), self.url_for(&request.path))
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body).map_err(|e| {
                TransportError::new(TransportErrorKind::Request, e.to_string(), start.elapsed())
            })?;
            builder = builder.body(bytes);
        }

        let response = builder.send().await.map_err(|e| {
            TransportError::from_reqwest(&e, TransportErrorKind::Request, start.elapsed())
        })?;
        let status = response.status().as_u16();

        let body = response.bytes().await.map_err(|e| {
            TransportError::from_reqwest(&e, TransportErrorKind::Body, start.elapsed())
        })?;

        Ok(ExecutorResponse {
            status,
            body: body.to_vec(),
            latency: start.elapsed(),
        })
    }
}
