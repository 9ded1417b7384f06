//! Credential handling for steproast.
//!
//! This crate covers the two kinds of credentials a step check needs:
//!
//! - **OAuth 2.0 refresh grant** for the fitness provider (Google), via
//!   [`OAuthFlow`] and the [`CredentialRefresher`] seam.
//! - **AWS Signature Version 4** for Bedrock and SNS, via [`SigV4Signer`].
//!
//! Nothing here persists credentials; every value comes from configuration
//! and lives for a single invocation.
//!
//! # Architecture
//!
//! ```text
//! OAuthRefresher ── OAuthFlow ── token endpoint
//! SigV4Signer    ── AwsCredentials
//! ```

pub mod aws;
pub mod error;
pub mod oauth;
pub mod refresher;

pub use aws::{AwsCredentials, DEFAULT_REGION, SigV4Signer, SignableRequest, SignedHeaders};
pub use error::{AuthEngineError, Result};
pub use oauth::{GOOGLE_TOKEN_URL, OAuthConfig, OAuthFlow, OAuthTokens};
pub use refresher::{AccessToken, CredentialRefresher, CredentialSeed, OAuthRefresher};
