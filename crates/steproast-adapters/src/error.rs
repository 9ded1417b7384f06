//! Adapter error types.
//!
//! All adapter subsystems surface errors through [`AdapterError`].  Each
//! variant carries enough context for callers to decide how to handle the
//! failure without inspecting opaque strings.

/// Unified error type for the step source and notifier adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {message}")]
    HttpStatus {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("could not decode {service} response: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },

    /// Configuration error in adapter setup.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Request signing failed.
    #[error("auth error: {0}")]
    Auth(#[from] steproast_auth::AuthEngineError),
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
