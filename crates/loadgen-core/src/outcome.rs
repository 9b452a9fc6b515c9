//! Results of individual actions and the records exposed to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::{TransportError, TransportErrorKind};

/// Why an action passed or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    Passed,
    /// The request completed but the response contradicts the scenario.
    ExpectationMismatch { expected: String, actual: u16 },
    /// The request never produced a response.
    TransportError { error: TransportErrorKind },
}

/// Coarse outcome category carried on exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Passed,
    ExpectationMismatch,
    TransportError,
}

/// Result of one action. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    /// Present iff the action failed.
    pub message: Option<String>,
    pub latency: Duration,
    /// `None` for transport errors.
    pub status: Option<u16>,
}

impl Outcome {
    pub fn passed(status: u16, latency: Duration) -> Self {
        Self {
            kind: OutcomeKind::Passed,
            message: None,
            latency,
            status: Some(status),
        }
    }

    pub fn mismatch(expected: String, actual: u16, message: String, latency: Duration) -> Self {
        Self {
            kind: OutcomeKind::ExpectationMismatch { expected, actual },
            message: Some(message),
            latency,
            status: Some(actual),
        }
    }

    pub fn transport(err: &TransportError) -> Self {
        Self {
            kind: OutcomeKind::TransportError { error: err.kind },
            message: Some(err.to_string()),
            latency: err.latency,
            status: None,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.kind, OutcomeKind::Passed)
    }

    pub fn category(&self) -> OutcomeCategory {
        match self.kind {
            OutcomeKind::Passed => OutcomeCategory::Passed,
            OutcomeKind::ExpectationMismatch { .. } => OutcomeCategory::ExpectationMismatch,
            OutcomeKind::TransportError { .. } => OutcomeCategory::TransportError,
        }
    }
}

/// Per-action record handed to aggregation and reporting consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_name: String,
    pub scenario: String,
    pub user_class: String,
    pub user_id: u64,
    pub success: bool,
    pub category: OutcomeCategory,
    pub status_code: Option<u16>,
    pub message: Option<String>,
    pub latency_millis: f64,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(
        action_name: &str,
        scenario: &str,
        user_class: &str,
        user_id: u64,
        outcome: &Outcome,
    ) -> Self {
        Self {
            action_name: action_name.to_string(),
            scenario: scenario.to_string(),
            user_class: user_class.to_string(),
            user_id,
            success: outcome.success(),
            category: outcome.category(),
            status_code: outcome.status,
            message: outcome.message.clone(),
            latency_millis: outcome.latency.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        }
    }
}
