//! Population management for virtual users.
//!
//! [`LoadScheduler::start`] spawns one spawner task per user class. Each
//! spawner ramps its class up to the target concurrency at the configured
//! rate, one user every `1 / spawn_rate` seconds. [`LoadScheduler::stop`]
//! cancels the shared token, waits for every user to reach `Stopped` and
//! aborts the ones still busy when the drain deadline passes.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::outcome::ActionRecord;
use crate::settings::SchedulerSettings;
use crate::user::{UserId, UserReport, VirtualUser};

/// Builds the user with the given id. Called once per spawned user.
pub type UserFactory = Arc<dyn Fn(UserId) -> VirtualUser + Send + Sync>;

/// A homogeneous group of users sharing a factory and a ramp-up profile.
#[derive(Clone)]
pub struct UserClass {
    name: String,
    target_concurrency: usize,
    spawn_rate: f64,
    factory: UserFactory,
}

impl UserClass {
    pub fn new<F>(
        name: impl Into<String>,
        target_concurrency: usize,
        spawn_rate: f64,
        factory: F,
    ) -> Self
    where
        F: Fn(UserId) -> VirtualUser + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target_concurrency,
            spawn_rate,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_concurrency(&self) -> usize {
        self.target_concurrency
    }

    /// Users spawned per second.
    pub fn spawn_rate(&self) -> f64 {
        self.spawn_rate
    }

    /// Build one user of this class.
    pub fn build_user(&self, id: UserId) -> VirtualUser {
        (self.factory)(id)
    }

    pub fn validate(&self) -> LoadResult<()> {
        if self.name.trim().is_empty() {
            return Err(LoadError::invalid_class(&self.name, "name must not be empty"));
        }
        if self.target_concurrency == 0 {
            return Err(LoadError::invalid_class(&self.name, "target concurrency must be > 0"));
        }
        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            return Err(LoadError::invalid_class(
                &self.name,
                format!("spawn rate must be a positive number, got {}", self.spawn_rate),
            ));
        }
        self.spawn_interval()?;
        Ok(())
    }

    /// Pause between two spawns. Fails when `1 / spawn_rate` is not a
    /// representable duration.
    pub fn spawn_interval(&self) -> LoadResult<Duration> {
        Duration::try_from_secs_f64(1.0 / self.spawn_rate).map_err(|_| {
            LoadError::invalid_class(
                &self.name,
                format!("spawn rate {} is too small", self.spawn_rate),
            )
        })
    }
}

impl fmt::Debug for UserClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClass")
            .field("name", &self.name)
            .field("target_concurrency", &self.target_concurrency)
            .field("spawn_rate", &self.spawn_rate)
            .finish_non_exhaustive()
    }
}

/// Why a user did not reach `Stopped` on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbnormalStopReason {
    /// Still busy when the drain deadline passed; the task was aborted.
    DrainTimeout,
    /// The user task panicked.
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbnormalStop {
    pub user_id: UserId,
    pub class: String,
    pub reason: AbnormalStopReason,
}

/// Result of a graceful stop.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    pub stopped: Vec<UserReport>,
    pub abnormal: Vec<AbnormalStop>,
    pub elapsed: Duration,
}

impl DrainReport {
    pub fn total_users(&self) -> usize {
        self.stopped.len() + self.abnormal.len()
    }

    pub fn is_clean(&self) -> bool {
        self.abnormal.is_empty()
    }
}

struct SpawnedUser {
    id: UserId,
    class: String,
    handle: JoinHandle<UserReport>,
}

/// Owns the population of virtual users for one run.
pub struct LoadScheduler {
    settings: SchedulerSettings,
    records: mpsc::Sender<ActionRecord>,
    shutdown: CancellationToken,
    next_id: Arc<AtomicU64>,
    spawners: Vec<JoinHandle<()>>,
    users: Arc<Mutex<Vec<SpawnedUser>>>,
    started: bool,
}

impl LoadScheduler {
    /// `records` receives one [`ActionRecord`] per completed action.
    pub fn new(settings: SchedulerSettings, records: mpsc::Sender<ActionRecord>) -> Self {
        Self {
            settings,
            records,
            shutdown: CancellationToken::new(),
            next_id: Arc::new(AtomicU64::new(0)),
            spawners: Vec::new(),
            users: Arc::new(Mutex::new(Vec::new())),
            started: false,
        }
    }

    /// Validate every class, then begin ramping users up.
    ///
    /// Validation happens before anything is spawned: on error no user runs.
    pub fn start(&mut self, classes: Vec<UserClass>) -> LoadResult<()> {
        if self.started {
            return Err(LoadError::AlreadyStarted);
        }
        if classes.is_empty() {
            return Err(LoadError::InvalidParameter {
                param: "user_classes".into(),
                message: "at least one user class is required".into(),
            });
        }

        let mut names = HashSet::new();
        let mut intervals = Vec::with_capacity(classes.len());
        for class in &classes {
            class.validate()?;
            if !names.insert(class.name.clone()) {
                return Err(LoadError::invalid_class(&class.name, "duplicate class name"));
            }
            intervals.push(class.spawn_interval()?);
        }

        let requested: usize = classes.iter().map(|c| c.target_concurrency).sum();
        if let Some(limit) = self.settings.max_users {
            if requested > limit {
                return Err(LoadError::ConcurrencyLimitExceeded { requested, limit });
            }
        }

        self.started = true;
        info!(classes = classes.len(), users = requested, "Starting load scheduler");

        for (class, interval) in classes.into_iter().zip(intervals) {
            info!(
                class = %class.name,
                target = class.target_concurrency,
                spawn_rate = class.spawn_rate,
                "Spawning user class"
            );
            self.spawners.push(tokio::spawn(spawn_class(
                class,
                interval,
                self.shutdown.clone(),
                self.records.clone(),
                Arc::clone(&self.next_id),
                Arc::clone(&self.users),
            )));
        }

        Ok(())
    }

    /// Token cancelled when `stop()` is called.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Users spawned so far, including finished ones.
    pub async fn spawned_users(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Users whose task has not finished yet.
    pub async fn active_users(&self) -> usize {
        self.users
            .lock()
            .await
            .iter()
            .filter(|u| !u.handle.is_finished())
            .count()
    }

    /// Signal every user to stop and wait for the population to drain.
    ///
    /// Users still running when the drain timeout elapses are aborted and
    /// reported as abnormal stops; this never fails the run.
    pub async fn stop(&mut self) -> DrainReport {
        let started_at = Instant::now();
        let deadline = started_at + self.settings.drain_timeout;
        info!(drain_timeout = ?self.settings.drain_timeout, "Stopping virtual users");
        self.shutdown.cancel();

        // Spawners exit promptly once cancelled; afterwards the user list is final.
        for spawner in self.spawners.drain(..) {
            if let Err(e) = spawner.await {
                warn!(error = %e, "User spawner task failed");
            }
        }

        let users = std::mem::take(&mut *self.users.lock().await);
        let drained = join_all(users.into_iter().map(|user| drain_user(user, deadline))).await;

        let mut report = DrainReport::default();
        for result in drained {
            match result {
                Ok(user_report) => report.stopped.push(user_report),
                Err(abnormal) => report.abnormal.push(abnormal),
            }
        }

        report.elapsed = started_at.elapsed();
        info!(
            stopped = report.stopped.len(),
            abnormal = report.abnormal.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Virtual users drained"
        );
        report
    }
}

impl Drop for LoadScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn drain_user(mut user: SpawnedUser, deadline: Instant) -> Result<UserReport, AbnormalStop> {
    match tokio::time::timeout_at(deadline, &mut user.handle).await {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => {
            warn!(user = user.id, class = %user.class, error = %e, "Virtual user task failed");
            Err(AbnormalStop {
                user_id: user.id,
                class: user.class,
                reason: AbnormalStopReason::Panicked(e.to_string()),
            })
        }
        Err(_) => {
            user.handle.abort();
            warn!(user = user.id, class = %user.class, "Virtual user did not drain in time, aborted");
            Err(AbnormalStop {
                user_id: user.id,
                class: user.class,
                reason: AbnormalStopReason::DrainTimeout,
            })
        }
    }
}

async fn spawn_class(
    class: UserClass,
    interval: Duration,
    shutdown: CancellationToken,
    records: mpsc::Sender<ActionRecord>,
    next_id: Arc<AtomicU64>,
    users: Arc<Mutex<Vec<SpawnedUser>>>,
) {
    let mut spawned = 0usize;

    while spawned < class.target_concurrency && !shutdown.is_cancelled() {
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        let user = class.build_user(id);
        let handle = tokio::spawn(user.run(shutdown.clone(), records.clone()));
        users.lock().await.push(SpawnedUser {
            id,
            class: class.name.clone(),
            handle,
        });
        spawned += 1;
        debug!(class = %class.name, user = id, spawned, "Spawned virtual user");

        if spawned < class.target_concurrency {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    info!(class = %class.name, spawned, "User class ramp-up finished");
}
