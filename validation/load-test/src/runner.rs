//! Load test orchestration.

use crate::config::TestConfig;
use crate::report::RunSummary;
use crate::scenarios::ProductProfile;
use crate::sink::{collect_records, JsonlSink, OutcomeSink};
use indicatif::{ProgressBar, ProgressStyle};
use loadgen_core::{
    CancellationToken, HttpExecutor, LoadScheduler, RequestExecutor, StdRng, UserClass, UserId,
    VirtualUser, VirtualUserState,
};
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Buffered records between users and the collector.
const RECORD_CHANNEL_CAPACITY: usize = 1024;

/// Executes one scenario end to end.
pub struct LoadRunner {
    config: TestConfig,
    show_progress: bool,
    outcome_log: Option<PathBuf>,
}

impl LoadRunner {
    /// Create a new load runner.
    pub fn new(config: TestConfig) -> Self {
        Self {
            config,
            show_progress: true,
            outcome_log: None,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Write records to `path` instead of the timestamped results file.
    /// Implies `log_outcomes`.
    pub fn with_outcome_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.outcome_log = Some(path.into());
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Run against the configured base URL until the duration elapses or
    /// Ctrl+C is pressed.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        self.config.validate()?;
        let executor = HttpExecutor::new(&self.config.base_url, self.config.total_users())?;

        let stop = CancellationToken::new();
        let ctrl_c = {
            let stop = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Ctrl+C received, stopping virtual users");
                    stop.cancel();
                }
            })
        };

        let result = self.run_with(Arc::new(executor), stop).await;
        ctrl_c.abort();
        result
    }

    /// Run with a caller-supplied executor. Cancelling `stop` ends the run early.
    pub async fn run_with(
        &self,
        executor: Arc<dyn RequestExecutor>,
        stop: CancellationToken,
    ) -> anyhow::Result<RunSummary> {
        self.config.validate()?;
        let classes = self.build_classes(executor)?;
        let duration = Duration::from_secs(self.config.duration_secs);

        info!(
            scenario = %self.config.name,
            base_url = %self.config.base_url,
            duration_secs = self.config.duration_secs,
            users = self.config.total_users(),
            classes = classes.len(),
            "Starting load test"
        );

        let sinks = self.open_sinks()?;
        let pb = self.progress_bar()?;

        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        let collector = tokio::spawn(collect_records(
            rx,
            RunSummary::new(&self.config.name),
            sinks,
            Some(pb.clone()),
        ));

        let mut scheduler = LoadScheduler::new(self.config.scheduler_settings()?, tx);
        scheduler.start(classes)?;

        let started = Instant::now();
        let deadline = started + duration;
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    info!("Stop requested before the scheduled end");
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    pb.set_position(started.elapsed().as_secs().min(self.config.duration_secs));
                }
            }
        }

        pb.set_message("Draining virtual users...");
        let drain = scheduler.stop().await;
        // Dropping the scheduler releases the last record sender.
        drop(scheduler);

        let mut summary = collector.await?;
        summary.finish(&drain, started.elapsed());
        pb.finish_with_message("Complete!");

        info!(
            actions = summary.totals.total(),
            passed = summary.totals.passed,
            failed = summary.totals.failed(),
            abnormal_stops = summary.abnormal_stops,
            elapsed_secs = summary.duration_secs,
            "Load test finished"
        );
        Ok(summary)
    }

    /// One engine class per configured class, each with its own catalog.
    ///
    /// All validation happens here, before any user exists.
    pub fn build_classes(&self, executor: Arc<dyn RequestExecutor>) -> anyhow::Result<Vec<UserClass>> {
        let profile = ProductProfile::from_config(&self.config);
        let settings = self.config.user_settings()?;
        let known_ids: Arc<[String]> = self.config.known_ids.clone().into();

        let mut classes = Vec::with_capacity(self.config.user_classes.len());
        for (index, class) in self.config.user_classes.iter().enumerate() {
            let catalog = Arc::new(profile.catalog(class)?);
            let executor = Arc::clone(&executor);
            let known_ids = Arc::clone(&known_ids);
            let name = class.name.clone();
            let counter_base = class.counter_base;
            let seed = self.config.seed;

            let factory = move |id: UserId| {
                VirtualUser::new(
                    id,
                    name.clone(),
                    Arc::clone(&catalog),
                    Arc::clone(&executor),
                    settings,
                    VirtualUserState::new(&known_ids, counter_base),
                    user_rng(seed, index, id),
                )
            };
            classes.push(UserClass::new(
                class.name.clone(),
                class.target_concurrency,
                class.spawn_rate_per_second,
                factory,
            ));
        }
        Ok(classes)
    }

    fn open_sinks(&self) -> anyhow::Result<Vec<Box<dyn OutcomeSink>>> {
        let sink = match (&self.outcome_log, self.config.log_outcomes) {
            (Some(path), _) => JsonlSink::create(path)?,
            (None, true) => JsonlSink::for_scenario(&self.config.name)?,
            (None, false) => return Ok(Vec::new()),
        };
        info!(path = %sink.path().display(), "Logging outcomes");
        let sink: Box<dyn OutcomeSink> = Box::new(sink);
        Ok(vec![sink])
    }

    fn progress_bar(&self) -> anyhow::Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(self.config.duration_secs);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}")?
                .progress_chars("##-"),
        );
        Ok(pb)
    }
}

/// Per-user RNG: derived from the run seed when set so runs are repeatable,
/// otherwise from entropy.
fn user_rng(seed: Option<u64>, class_index: usize, id: UserId) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(
            seed.wrapping_add((class_index as u64) << 32)
                .wrapping_add(id),
        ),
        None => StdRng::from_entropy(),
    }
}
