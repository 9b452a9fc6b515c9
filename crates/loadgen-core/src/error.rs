//! Error types for the load generation engine.

use thiserror::Error;

/// Result type alias using LoadError.
pub type LoadResult<T> = Result<T, LoadError>;

/// Primary error type for engine setup and lifecycle.
///
/// Per-action failures never surface here: they are folded into
/// [`Outcome`](crate::outcome::Outcome) records inside the user loop.
#[derive(Debug, Error)]
pub enum LoadError {
    // === Configuration Errors ===
    #[error("Action catalog is empty")]
    EmptyCatalog,

    #[error("Action catalog has zero total weight")]
    ZeroTotalWeight,

    #[error("Action '{0}' has zero weight")]
    ZeroWeight(String),

    #[error("Action '{0}' registered more than once")]
    DuplicateAction(String),

    #[error("Total action weight overflows")]
    WeightOverflow,

    #[error("Invalid think time: {0}")]
    InvalidThinkTime(String),

    #[error("Invalid user class '{class}': {message}")]
    InvalidUserClass { class: String, message: String },

    #[error("Requested {requested} users but the limit is {limit}")]
    ConcurrencyLimitExceeded { requested: usize, limit: usize },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Lifecycle Errors ===
    #[error("Scheduler already started")]
    AlreadyStarted,

    // === Infrastructure Errors ===
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl LoadError {
    /// Whether this error belongs to the configuration category.
    ///
    /// Configuration errors are fatal at startup: the run never begins.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LoadError::EmptyCatalog
                | LoadError::ZeroTotalWeight
                | LoadError::ZeroWeight(_)
                | LoadError::DuplicateAction(_)
                | LoadError::WeightOverflow
                | LoadError::InvalidThinkTime(_)
                | LoadError::InvalidUserClass { .. }
                | LoadError::ConcurrencyLimitExceeded { .. }
                | LoadError::InvalidParameter { .. }
        )
    }

    pub(crate) fn invalid_class(class: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::InvalidUserClass {
            class: class.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Http(err.to_string())
    }
}
