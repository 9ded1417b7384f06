//! Roast generation.
//!
//! A roast is one short, sarcastic message meant to guilt the user into
//! moving. The prompt is fixed: tone is not configurable per request and the
//! step count is deliberately left out of it.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AgentError, Result};
use crate::llm::client::BedrockClient;
use crate::llm::types::{ChatRequest, Message};

/// Token ceiling for a single roast.
pub const MAX_ROAST_TOKENS: u32 = 200;

/// The instruction sent to the model on every invocation.
pub const ROAST_PROMPT: &str = "You are a sarcastic fitness coach who's fed up with laziness.
Write short, passive-aggressive messages for users who have taken 0\u{2013}100 steps today according to their fitness tracker.
The tone should be funny, judgmental, and lightly insulting \u{2014} not offensive, but enough to guilt the user into moving.
Think of how a friend who roasts you would say it.
Generate one short roast message";

/// Produces one roast per call.
#[async_trait]
pub trait RoastGenerator: Send + Sync {
    /// Generate a fresh roast, trimmed of surrounding whitespace.
    ///
    /// Output varies between calls. Failure is fatal for the invocation;
    /// there is no canned fallback.
    async fn generate(&self) -> Result<String>;
}

/// The fixed request every roast is generated from.
pub fn roast_request() -> ChatRequest {
    ChatRequest {
        system: None,
        messages: vec![Message::user(ROAST_PROMPT)],
        max_tokens: MAX_ROAST_TOKENS,
    }
}

/// [`RoastGenerator`] backed by a Bedrock-hosted Claude model.
pub struct BedrockRoastGenerator {
    client: BedrockClient,
}

impl BedrockRoastGenerator {
    /// Wrap a configured Bedrock client.
    pub fn new(client: BedrockClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoastGenerator for BedrockRoastGenerator {
    async fn generate(&self) -> Result<String> {
        debug!(model_id = %self.client.model_id(), "requesting roast");

        let response = self.client.invoke(&roast_request()).await?;
        let roast = response.text.trim();
        if roast.is_empty() {
            return Err(AgentError::EmptyCompletion);
        }

        info!(
            model_id = %self.client.model_id(),
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "roast generated"
        );

        Ok(roast.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
