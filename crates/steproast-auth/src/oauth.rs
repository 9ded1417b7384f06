//! OAuth 2.0 refresh-token grant.
//!
//! Exchanges a long-lived refresh token for a short-lived access token as
//! defined in RFC 6749 section 6. Only the refresh leg of the protocol is
//! implemented; obtaining the initial refresh token (consent screen, code
//! exchange) happens outside this program.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{AuthEngineError, Result};

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Client registration used for the refresh grant.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// The OAuth client ID.
    pub client_id: String,

    /// The OAuth client secret (confidential clients only).
    pub client_secret: Option<SecretString>,

    /// The token endpoint URL.
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration for a Google OAuth client. An empty secret means a
    /// public client.
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<SecretString>) -> Self {
        let client_secret = client_secret.into();
        Self {
            client_id: client_id.into(),
            client_secret: (!client_secret.expose_secret().is_empty()).then_some(client_secret),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Point the configuration at a different token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Result of a successful refresh.
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    /// The access token used to authenticate API requests.
    pub access_token: SecretString,

    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: Option<i64>,
}

/// Raw token response from the authorization server. Not `Debug`: it holds
/// the token in the clear until [`TokenResponse::into_tokens`].
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into [`OAuthTokens`], computing `expires_at` from `expires_in`.
    fn into_tokens(self) -> OAuthTokens {
        OAuthTokens {
            access_token: SecretString::from(self.access_token),
            expires_at: self
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs),
        }
    }
}

/// Raw error response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// OAuth flow
// ---------------------------------------------------------------------------

/// Performs refresh grants against a single token endpoint.
///
/// Stateless apart from the HTTP client; the refresh token is passed in per
/// call.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthFlow {
    /// Create a new flow with the given configuration.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a flow that reuses an existing HTTP client.
    pub fn with_client(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// The configuration this flow was built with.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Refresh an access token using a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::InvalidGrant`] if the refresh token is
    /// invalid or revoked, or [`AuthEngineError::NetworkError`] on transport
    /// failure.
    pub async fn refresh_token(&self, refresh_token: &SecretString) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", self.config.client_id.as_str()),
        ];

        if let Some(ref secret) = self.config.client_secret {
            params.push(("client_secret", secret.expose_secret()));
        }

        tracing::debug!(token_url = %self.config.token_url, "refreshing access token");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        Self::parse_token_response(response).await
    }

    /// Parse the HTTP response from the token endpoint.
    async fn parse_token_response(response: reqwest::Response) -> Result<OAuthTokens> {
        let status = response.status();

        if status.is_success() {
            let token_response: TokenResponse = response.json().await?;
            tracing::debug!("token refresh successful");
            Ok(token_response.into_tokens())
        } else {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<TokenErrorResponse>(&body) {
                let reason = error_response
                    .error_description
                    .unwrap_or(error_response.error);
                Err(AuthEngineError::InvalidGrant { reason })
            } else {
                Err(AuthEngineError::InvalidGrant {
                    reason: format!("HTTP {status}: {body}"),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
