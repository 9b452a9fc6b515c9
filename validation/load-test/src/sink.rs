//! Consumers of per-action records.

use indicatif::ProgressBar;
use loadgen_core::ActionRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::report::RunSummary;

/// Receives every [`ActionRecord`] produced during a run.
pub trait OutcomeSink: Send {
    fn record(&mut self, record: &ActionRecord) -> anyhow::Result<()>;

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Log file for `scenario_name` under the results directory, stamped with
    /// the current time.
    pub fn for_scenario(scenario_name: &str) -> anyhow::Result<Self> {
        Self::create(outcome_log_path(&results_dir(), scenario_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutcomeSink for JsonlSink {
    fn record(&mut self, record: &ActionRecord) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// `validation/load-test/results` when run from the workspace root,
/// otherwise `results/` in the current directory.
pub fn results_dir() -> PathBuf {
    if Path::new("validation/load-test").exists() {
        PathBuf::from("validation/load-test/results")
    } else {
        PathBuf::from("results")
    }
}

pub fn outcome_log_path(dir: &Path, scenario_name: &str) -> PathBuf {
    let scenario_name = scenario_name.replace(' ', "_").to_lowercase();
    dir.join(format!(
        "{}_{}.jsonl",
        scenario_name,
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Drain `records` into the summary and every sink until all senders are
/// dropped, then return the finished summary.
///
/// A failing sink is reported once and then skipped; it never stops the run.
pub async fn collect_records(
    mut records: mpsc::Receiver<ActionRecord>,
    mut summary: RunSummary,
    mut sinks: Vec<Box<dyn OutcomeSink>>,
    progress: Option<ProgressBar>,
) -> RunSummary {
    let mut broken = vec![false; sinks.len()];
    let mut received = 0u64;

    while let Some(record) = records.recv().await {
        received += 1;
        summary.add(&record);
        if let Some(pb) = &progress {
            pb.set_message(format!(
                "{} actions, {} failed",
                summary.totals.total(),
                summary.totals.failed()
            ));
        }
        for (sink, broken) in sinks.iter_mut().zip(broken.iter_mut()) {
            if *broken {
                continue;
            }
            if let Err(e) = sink.record(&record) {
                warn!(error = %e, "Outcome sink failed, disabling it");
                *broken = true;
            }
        }
    }

    for sink in sinks.iter_mut() {
        if let Err(e) = sink.flush() {
            warn!(error = %e, "Failed to flush outcome sink");
        }
    }
    debug!(received, "Record channel closed");
    summary
}
