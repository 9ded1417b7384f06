//! Error types for the auth crate.
//!
//! All credential operations surface errors through [`AuthEngineError`],
//! which is the single error type for this crate. Each variant carries enough
//! context for callers to decide how to handle the failure.

/// Unified error type for steproast credential handling.
#[derive(Debug, thiserror::Error)]
pub enum AuthEngineError {
    /// The refresh grant was rejected by the authorization server.
    #[error("invalid grant: {reason}")]
    InvalidGrant {
        /// Explanation from the authorization server.
        reason: String,
    },

    /// An HTTP request to the authorization server failed.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A request could not be signed.
    #[error("request signing failed: {reason}")]
    SigningFailed {
        /// Why signing was not possible.
        reason: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthEngineError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
