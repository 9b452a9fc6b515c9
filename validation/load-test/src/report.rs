//! Run summary and formatting.

use chrono::{DateTime, Utc};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use loadgen_core::{ActionRecord, DrainReport, OutcomeCategory};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Pass/fail counts for one action or for the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub passed: u64,
    pub expectation_mismatch: u64,
    pub transport_error: u64,
}

impl OutcomeCounts {
    pub fn add(&mut self, category: OutcomeCategory) {
        match category {
            OutcomeCategory::Passed => self.passed += 1,
            OutcomeCategory::ExpectationMismatch => self.expectation_mismatch += 1,
            OutcomeCategory::TransportError => self.transport_error += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed()
    }

    pub fn failed(&self) -> u64 {
        self.expectation_mismatch + self.transport_error
    }

    /// Percentage of passed actions; 0 when nothing ran.
    pub fn pass_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.passed as f64 / total as f64 * 100.0,
        }
    }
}

/// Aggregated outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub users_stopped: usize,
    pub abnormal_stops: usize,
    pub totals: OutcomeCounts,
    pub actions: BTreeMap<String, OutcomeCounts>,
    /// Counts per concrete branch, e.g. `fetch_missing`.
    pub scenarios: BTreeMap<String, OutcomeCounts>,
}

impl RunSummary {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.into(),
            started_at: Utc::now(),
            duration_secs: 0.0,
            users_stopped: 0,
            abnormal_stops: 0,
            totals: OutcomeCounts::default(),
            actions: BTreeMap::new(),
            scenarios: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, record: &ActionRecord) {
        self.totals.add(record.category);
        self.actions
            .entry(record.action_name.clone())
            .or_default()
            .add(record.category);
        self.scenarios
            .entry(record.scenario.clone())
            .or_default()
            .add(record.category);
    }

    /// Fold in how the population stopped.
    pub fn finish(&mut self, drain: &DrainReport, elapsed: Duration) {
        self.users_stopped = drain.stopped.len();
        self.abnormal_stops = drain.abnormal.len();
        self.duration_secs = elapsed.as_secs_f64();
    }

    pub fn actions_per_second(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.totals.total() as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Formats run summaries for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(summary: &RunSummary) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                format!("Load Test Results: {}", summary.scenario),
                "Passed".to_string(),
                "Mismatch".to_string(),
                "Transport".to_string(),
                "Pass Rate".to_string(),
            ]);

        for (name, counts) in &summary.actions {
            table.add_row(counts_row(name, counts));
        }
        table.add_row(vec!["", "", "", "", ""]);
        for (name, counts) in &summary.scenarios {
            table.add_row(counts_row(&format!("  {}", name), counts));
        }
        table.add_row(vec!["", "", "", "", ""]);
        table.add_row(counts_row("Total", &summary.totals));

        table.add_row(vec!["", "", "", "", ""]);
        table.add_row(vec![
            "Duration:".to_string(),
            format!("{:.1}s", summary.duration_secs),
            String::new(),
            String::new(),
            String::new(),
        ]);
        table.add_row(vec![
            "Actions/sec:".to_string(),
            format!("{:.1}", summary.actions_per_second()),
            String::new(),
            String::new(),
            String::new(),
        ]);
        table.add_row(vec![
            "Users stopped / aborted:".to_string(),
            format!("{} / {}", summary.users_stopped, summary.abnormal_stops),
            String::new(),
            String::new(),
            String::new(),
        ]);

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(summary: &RunSummary) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }
}

fn counts_row(name: &str, counts: &OutcomeCounts) -> Vec<String> {
    vec![
        name.to_string(),
        counts.passed.to_string(),
        counts.expectation_mismatch.to_string(),
        counts.transport_error.to_string(),
        format!("{:.1}%", counts.pass_rate()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadgen_core::{Outcome, TransportError, TransportErrorKind};

    fn record(action: &str, scenario: &str, outcome: Outcome) -> ActionRecord {
        ActionRecord::new(action, scenario, "standard", 0, &outcome)
    }

    fn sample() -> RunSummary {
        let latency = Duration::from_millis(4);
        let mut summary = RunSummary::new("product-mixed");
        summary.add(&record("get_products", "fetch_missing", Outcome::passed(404, latency)));
        summary.add(&record("get_products", "fetch_existing", Outcome::passed(200, latency)));
        summary.add(&record(
            "create_valid_product",
            "create_valid",
            Outcome::mismatch("201 or 409".into(), 500, "Got unexpected status code 500".into(), latency),
        ));
        summary.add(&record(
            "get_products",
            "list_all",
            Outcome::transport(&TransportError::new(TransportErrorKind::Timeout, "slow", latency)),
        ));
        summary
    }

    #[test]
    fn test_counts_by_action_and_category() {
        let summary = sample();
        assert_eq!(summary.totals.total(), 4);
        assert_eq!(summary.totals.failed(), 2);
        assert_eq!(summary.actions["get_products"].passed, 2);
        assert_eq!(summary.actions["get_products"].transport_error, 1);
        assert_eq!(summary.actions["create_valid_product"].expectation_mismatch, 1);
        assert_eq!(summary.scenarios["fetch_missing"].passed, 1);
        assert_eq!(summary.totals.pass_rate(), 50.0);
    }

    #[test]
    fn test_empty_summary_has_zero_rates() {
        let summary = RunSummary::new("empty");
        assert_eq!(summary.totals.pass_rate(), 0.0);
        assert_eq!(summary.actions_per_second(), 0.0);
    }

    #[test]
    fn test_finish_records_drain() {
        let mut summary = sample();
        let drain = DrainReport::default();
        summary.finish(&drain, Duration::from_secs(2));
        assert_eq!(summary.actions_per_second(), 2.0);
        assert_eq!(summary.abnormal_stops, 0);
    }

    #[test]
    fn test_formats_render() {
        let summary = sample();
        let table = ResultsReport::format_table(&summary);
        assert!(table.contains("product-mixed"));
        assert!(table.contains("create_valid_product"));

        let json: serde_json::Value =
            serde_json::from_str(&ResultsReport::format_json(&summary).unwrap()).unwrap();
        assert_eq!(json["totals"]["passed"], 2);
        assert_eq!(json["actions"]["get_products"]["transport_error"], 1);
    }
}
