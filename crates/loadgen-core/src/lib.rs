//! Virtual-user load generation engine.
//!
//! This crate provides:
//! - A weighted, immutable action catalog with prefix-sum selection
//! - Request intents carrying their own expected outcome
//! - Response classification that treats expected 404/400/409 as passes
//! - Virtual users with private state, think-time pacing and cooperative stop
//! - A scheduler that ramps user classes up and drains them on stop
//! - A reqwest-backed executor for real runs

pub mod catalog;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod intent;
pub mod outcome;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod user;

pub use catalog::{ActionCatalog, ActionSpec, CatalogBuilder, Generator};
pub use classifier::classify;
pub use error::{LoadError, LoadResult};
pub use executor::{
    ExecutorResponse, HttpExecutor, RequestExecutor, TransportError, TransportErrorKind,
};
pub use intent::{Expectation, HttpMethod, HttpRequest, RequestIntent};
pub use outcome::{ActionRecord, Outcome, OutcomeCategory, OutcomeKind};
pub use scheduler::{
    AbnormalStop, AbnormalStopReason, DrainReport, LoadScheduler, UserClass, UserFactory,
};
pub use settings::{SchedulerSettings, ThinkTime, UserSettings};
pub use state::VirtualUserState;
pub use user::{UserId, UserPhase, UserReport, VirtualUser};

// Re-exported so downstream generators and factories name the same types.
pub use rand::rngs::StdRng;
pub use tokio_util::sync::CancellationToken;
