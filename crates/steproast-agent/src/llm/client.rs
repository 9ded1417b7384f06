//! AWS Bedrock Runtime client for Anthropic Claude models.
//!
//! Sends non-streaming `InvokeModel` requests.  Bedrock takes the Claude
//! Messages API JSON body minus the `model` field (the model goes in the URL
//! path) plus a required `anthropic_version`.
//!
//! Two authentication modes are supported: SigV4 with an AWS key pair, or a
//! Bedrock API key sent as a bearer token.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use steproast_auth::{AwsCredentials, SigV4Signer, SignableRequest};
use url::Url;

use crate::error::{AgentError, Result};
use crate::llm::types::{ChatRequest, LlmResponse, Message, StopReason, Usage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Anthropic API version Bedrock expects in the request body.
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Default model: Claude 3 Haiku.
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// SigV4 service name for the runtime API.
const SIGNING_SERVICE: &str = "bedrock";

const JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How requests to Bedrock are authenticated.
#[derive(Debug, Clone)]
pub enum BedrockAuth {
    /// AWS Signature Version 4 with an access key pair.
    SigV4(AwsCredentials),
    /// Bedrock API key, sent as `Authorization: Bearer`.
    Bearer(SecretString),
}

/// Configuration for a Bedrock Runtime endpoint.
#[derive(Debug, Clone)]
pub struct BedrockConfig {
    /// AWS region (e.g. `us-east-1`).
    pub region: String,
    /// Fully qualified Bedrock model ID.
    pub model_id: String,
    /// Endpoint override; defaults to the regional runtime endpoint.
    pub endpoint: Option<String>,
    /// Authentication mode.
    pub auth: BedrockAuth,
}

impl BedrockConfig {
    /// Configuration for the default model in `region`.
    pub fn new(region: impl Into<String>, auth: BedrockAuth) -> Self {
        Self {
            region: region.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            endpoint: None,
            auth,
        }
    }

    /// Use a different model.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Send requests to `endpoint` instead of the regional default.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> String {
        match self.endpoint {
            Some(ref endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body for `InvokeModel` on an Anthropic model.
#[derive(Debug, Serialize)]
struct BedrockRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

/// Non-streaming Messages API response.
#[derive(Debug, Deserialize)]
struct BedrockResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Error body returned by AWS JSON services.
#[derive(Debug, Deserialize)]
struct BedrockErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A Bedrock Runtime client bound to one model.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    config: BedrockConfig,
    http: reqwest::Client,
}

impl BedrockClient {
    /// Create a new client with the given configuration.
    pub fn new(config: BedrockConfig) -> Result<Self> {
        if let BedrockAuth::Bearer(ref key) = config.auth {
            if key.expose_secret().trim().is_empty() {
                return Err(AgentError::MissingApiKey {
                    provider: "bedrock".into(),
                });
            }
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// The model requests are sent to.
    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    /// Full `invoke` URL. The model ID is percent-encoded (`:` becomes `%3A`).
    fn invoke_url(&self) -> Result<Url> {
        let raw = format!(
            "{}/model/{}/invoke",
            self.config.base_url(),
            urlencoding::encode(&self.config.model_id)
        );
        Url::parse(&raw).map_err(|e| AgentError::ConfigError {
            reason: format!("invalid bedrock url `{raw}`: {e}"),
        })
    }

    /// Send a completion request and return the first content block.
    pub async fn invoke(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = self.invoke_url()?;
        let body = serde_json::to_vec(&BedrockRequest {
            anthropic_version: BEDROCK_ANTHROPIC_VERSION,
            max_tokens: request.max_tokens,
            messages: &request.messages,
            system: request.system.as_deref(),
        })?;

        tracing::debug!(
            url = %url,
            model_id = %self.config.model_id,
            max_tokens = request.max_tokens,
            "bedrock invoke request"
        );

        let builder = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON);

        let builder = match self.config.auth {
            BedrockAuth::Bearer(ref key) => {
                builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()))
            }
            BedrockAuth::SigV4(ref credentials) => {
                let signer = SigV4Signer::new(
                    credentials.clone(),
                    self.config.region.clone(),
                    SIGNING_SERVICE,
                );
                let signed = signer.sign(
                    &SignableRequest {
                        method: "POST",
                        url: &url,
                        headers: &[("content-type", JSON), ("accept", JSON)],
                        payload: &body,
                    },
                    chrono::Utc::now(),
                )?;
                signed.apply(builder)
            }
        };

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            let message = serde_json::from_str::<BedrockErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            tracing::warn!(status = %status, message = %message, "bedrock error response");
            return Err(AgentError::LlmHttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        Self::parse_response(&text)
    }

    /// Extract the first content block's text from a response body.
    fn parse_response(body: &str) -> Result<LlmResponse> {
        let parsed: BedrockResponse =
            serde_json::from_str(body).map_err(|e| AgentError::LlmParseFailed {
                reason: format!("invalid response body: {e}"),
            })?;

        let text = match parsed.content.into_iter().next() {
            Some(ContentBlock::Text { text }) => text,
            Some(ContentBlock::Other) => {
                return Err(AgentError::LlmParseFailed {
                    reason: "first content block is not text".into(),
                });
            }
            None => return Err(AgentError::EmptyCompletion),
        };

        Ok(LlmResponse {
            text,
            stop_reason: StopReason::from_wire(parsed.stop_reason.as_deref()),
            usage: parsed.usage,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
