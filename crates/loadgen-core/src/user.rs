//! Virtual user sessions.
//!
//! A [`VirtualUser`] moves through `Idle → Running → Stopped`. While running it
//! repeats: draw an action, generate the intent, execute it, classify the
//! response, apply the state change, then pause for think-time. The stop
//! signal is only honoured between iterations or during the pause, so a
//! request that has started always ends in an [`Outcome`].

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::catalog::ActionCatalog;
use crate::classifier::classify;
use crate::executor::{ExecutorResponse, RequestExecutor, TransportError, TransportErrorKind};
use crate::intent::RequestIntent;
use crate::outcome::{ActionRecord, Outcome};
use crate::settings::UserSettings;
use crate::state::VirtualUserState;

/// Unique identifier of a virtual user within one run.
pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserPhase {
    Idle,
    Running,
    Stopped,
}

/// Final account of a user that reached `Stopped`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserReport {
    pub id: UserId,
    pub class: String,
    pub phase: UserPhase,
    pub iterations: u64,
    pub created_ids: Vec<String>,
}

/// One simulated client session.
pub struct VirtualUser {
    id: UserId,
    class: String,
    catalog: Arc<ActionCatalog>,
    executor: Arc<dyn RequestExecutor>,
    settings: UserSettings,
    state: VirtualUserState,
    rng: StdRng,
    phase: UserPhase,
    iterations: u64,
}

impl VirtualUser {
    pub fn new(
        id: UserId,
        class: impl Into<String>,
        catalog: Arc<ActionCatalog>,
        executor: Arc<dyn RequestExecutor>,
        settings: UserSettings,
        state: VirtualUserState,
        rng: StdRng,
    ) -> Self {
        Self {
            id,
            class: class.into(),
            catalog,
            executor,
            settings,
            state,
            rng,
            phase: UserPhase::Idle,
            iterations: 0,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn phase(&self) -> UserPhase {
        self.phase
    }

    pub fn state(&self) -> &VirtualUserState {
        &self.state
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run one iteration without pacing and return its record.
    ///
    /// An `Idle` user enters `Running` on its first step. Calling this on a
    /// `Stopped` user is a logic error and is ignored in release builds.
    pub async fn step(&mut self) -> ActionRecord {
        debug_assert!(self.phase != UserPhase::Stopped, "step on a stopped user");
        if self.phase == UserPhase::Idle {
            self.phase = UserPhase::Running;
        }

        let catalog = Arc::clone(&self.catalog);
        let action = catalog.select(&mut self.rng);
        let intent = action.generate(&mut self.state, &mut self.rng);

        let result = self.execute(&intent).await;
        let outcome = classify(&intent, &result);
        self.apply(&intent, &outcome);
        self.iterations += 1;

        if outcome.success() {
            debug!(
                action = action.name(),
                scenario = %intent.scenario,
                status = ?outcome.status,
                latency_ms = outcome.latency.as_millis() as u64,
                "action passed"
            );
        } else {
            warn!(
                action = action.name(),
                scenario = %intent.scenario,
                status = ?outcome.status,
                message = outcome.message.as_deref().unwrap_or_default(),
                "action failed"
            );
        }

        ActionRecord::new(action.name(), &intent.scenario, &self.class, self.id, &outcome)
    }

    /// Loop until `shutdown` is cancelled, publishing one record per action.
    #[instrument(skip_all, fields(class = %self.class, user = self.id))]
    pub async fn run(
        mut self,
        shutdown: CancellationToken,
        records: mpsc::Sender<ActionRecord>,
    ) -> UserReport {
        self.phase = UserPhase::Running;
        debug!("virtual user running");

        while !shutdown.is_cancelled() {
            let record = self.step().await;
            if records.send(record).await.is_err() {
                debug!("record consumer closed, dropping record");
            }

            let pause = self.settings.think_time.sample(&mut self.rng);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.phase = UserPhase::Stopped;
        debug!(iterations = self.iterations, "virtual user stopped");

        UserReport {
            id: self.id,
            class: self.class,
            phase: self.phase,
            iterations: self.iterations,
            created_ids: self.state.created_ids().to_vec(),
        }
    }

    // The executor receives the timeout too; the outer bound covers
    // executors that ignore it.
    async fn execute(
        &self,
        intent: &RequestIntent,
    ) -> Result<ExecutorResponse, TransportError> {
        let timeout = self.settings.request_timeout;
        let start = Instant::now();
        match tokio::time::timeout(timeout, self.executor.execute(&intent.request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(
                TransportErrorKind::Timeout,
                format!("no response within {:?}", timeout),
                start.elapsed(),
            )),
        }
    }

    fn apply(&mut self, intent: &RequestIntent, outcome: &Outcome) {
        if outcome.status == Some(201) {
            if let Some(id) = &intent.creates {
                self.state.record_created(id.clone());
            }
        }
    }
}
