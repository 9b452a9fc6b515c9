//! Shared test utilities for the loadgen workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Scripted request executors that never touch the network
//! - An in-memory product API for end-to-end runs
//! - Common catalogs, user factories and scenario files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{ScriptedExecutor, fixtures};
//! ```

pub mod executor;
pub mod fixtures;
pub mod product_api;

// Re-export commonly used items at the crate root
pub use executor::ScriptedExecutor;
pub use fixtures::*;
pub use product_api::{ProductApiSim, SEED_PRODUCT_IDS};

/// Assert that an observed count is within `sigmas` standard deviations of a
/// binomial expectation.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_frequency;
///
/// // 1000 draws of an action with probability 0.75
/// assert_frequency!(observed, 1000, 0.75, 4.0);
/// ```
#[macro_export]
macro_rules! assert_frequency {
    ($observed:expr, $draws:expr, $probability:expr, $sigmas:expr) => {{
        let observed: f64 = $observed as f64;
        let draws: f64 = $draws as f64;
        let p: f64 = $probability as f64;
        let expected = draws * p;
        let margin = $sigmas as f64 * (draws * p * (1.0 - p)).sqrt();
        if (observed - expected).abs() > margin {
            panic!(
                "assertion failed: frequency out of range\n  observed: `{}`,\n  expected: `{:.1}` ± `{:.1}`",
                observed, expected, margin
            );
        }
    }};
}
