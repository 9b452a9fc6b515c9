//! Load generator for the product API.
//!
//! This crate provides tools to:
//! - Describe a run as a YAML scenario (users, pacing, action weights)
//! - Drive weighted virtual users against the product endpoints
//! - Judge every response against the outcome its scenario expects
//! - Summarize results per action (console table or JSON) and log outcomes

pub mod config;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod sink;

pub use config::{ActionWeights, BranchMix, TestConfig, UserClassConfig};
pub use report::{OutcomeCounts, ResultsReport, RunSummary};
pub use runner::LoadRunner;
pub use scenarios::ProductProfile;
pub use sink::{JsonlSink, OutcomeSink};
