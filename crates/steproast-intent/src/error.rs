//! Intent error types.
//!
//! [`StepCheckError`] is the failure taxonomy of a single step check; every
//! variant is fatal for the invocation and becomes a 500 response.
//! [`IntentError`] covers the scheduling machinery around it.

use steproast_adapters::AdapterError;
use steproast_agent::AgentError;
use steproast_auth::AuthEngineError;

/// Why a step check did not complete.
#[derive(Debug, thiserror::Error)]
pub enum StepCheckError {
    /// The refresh grant was rejected or could not be performed.
    #[error("Invalid refresh token or expired credentials")]
    Authentication(#[source] AuthEngineError),

    /// The fitness provider could not be queried or answered garbage.
    #[error("{0}")]
    DataFetch(#[source] AdapterError),

    /// The model call failed or produced nothing usable.
    #[error("{0}")]
    Generation(#[source] AgentError),

    /// The notification could not be published.
    #[error("{0}")]
    Publish(#[source] AdapterError),
}

impl StepCheckError {
    /// Short stage name for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::DataFetch(_) => "data_fetch",
            Self::Generation(_) => "generation",
            Self::Publish(_) => "publish",
        }
    }
}

/// Error type for scheduling.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// A cron expression is invalid.
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    /// A cron expression parsed but never fires.
    #[error("cron expression `{expression}` has no upcoming run")]
    NoUpcomingRun { expression: String },

    /// `start` was called twice.
    #[error("scheduler is already running")]
    AlreadyRunning,
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
