//! Per-invocation access credential acquisition.
//!
//! The [`CredentialRefresher`] trait is the seam the step check uses to get
//! an access token; [`OAuthRefresher`] is the production implementation
//! backed by an [`OAuthFlow`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::{AuthEngineError, Result};
use crate::oauth::{OAuthConfig, OAuthFlow};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A short-lived bearer credential.
///
/// The token value is only reachable through [`AccessToken::secret`] and
/// never appears in `Debug` output.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building `Authorization` headers.
    pub fn secret(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Externally held credentials the refresher starts from.
#[derive(Debug, Clone)]
pub struct CredentialSeed {
    /// Long-lived refresh token.
    pub refresh_token: SecretString,
    /// Previously issued access token, if any.
    pub access_token: Option<SecretString>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Produces a valid access credential for the current invocation.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Obtain a fresh access token.
    ///
    /// Failure is fatal for the invocation; implementations do not retry.
    async fn refresh(&self) -> Result<AccessToken>;
}

// ---------------------------------------------------------------------------
// OAuth implementation
// ---------------------------------------------------------------------------

/// Refreshes through an OAuth token endpoint on every call.
pub struct OAuthRefresher {
    flow: OAuthFlow,
    seed: CredentialSeed,
}

impl OAuthRefresher {
    /// Create a refresher for the given client registration and seed.
    pub fn new(config: OAuthConfig, seed: CredentialSeed) -> Self {
        Self {
            flow: OAuthFlow::new(config),
            seed,
        }
    }
}

#[async_trait]
impl CredentialRefresher for OAuthRefresher {
    async fn refresh(&self) -> Result<AccessToken> {
        if self.seed.refresh_token.expose_secret().trim().is_empty() {
            return Err(AuthEngineError::InvalidConfig {
                reason: "refresh token is not configured".to_string(),
            });
        }

        if self.seed.access_token.is_some() {
            debug!("seed access token present, refreshing regardless");
        }

        let tokens = self.flow.refresh_token(&self.seed.refresh_token).await?;

        info!(
            client_id = %self.flow.config().client_id,
            expires_at = ?tokens.expires_at,
            "access token refreshed"
        );

        Ok(AccessToken::new(tokens.access_token))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn seed(refresh: &str) -> CredentialSeed {
        CredentialSeed {
            refresh_token: SecretString::from(refresh),
            access_token: Some(SecretString::from("seed-access")),
        }
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert!(!format!("{token:?}").contains("ya29.secret"));
        assert_eq!(token.secret(), "ya29.secret");
    }

    #[test]
    fn seed_debug_is_redacted() {
        let debug = format!("{:?}", seed("1//refresh"));
        assert!(!debug.contains("1//refresh"));
        assert!(!debug.contains("seed-access"));
    }

    #[tokio::test]
    async fn empty_refresh_token_is_rejected_without_network() {
        let config = OAuthConfig::google("id", "secret").with_token_url("http://127.0.0.1:9/token");
        let refresher = OAuthRefresher::new(config, seed("  "));
        let err = refresher.refresh().await.unwrap_err();
        assert!(matches!(err, AuthEngineError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn refresh_returns_new_access_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.fresh","expires_in":3600}"#)
            .create_async()
            .await;

        let config =
            OAuthConfig::google("id", "secret").with_token_url(format!("{}/token", server.url()));
        let refresher = OAuthRefresher::new(config, seed("1//refresh"));

        let token = refresher.refresh().await.unwrap();
        assert_eq!(token.secret(), "ya29.fresh");
    }
}
