//! Text generation for steproast.
//!
//! This crate turns a fixed instruction into a fresh roast message using a
//! Claude model hosted on AWS Bedrock.
//!
//! ## Modules
//!
//! - [`llm`] -- Bedrock client and wire types.
//! - [`roast`] -- The [`RoastGenerator`] seam and its Bedrock implementation.
//! - [`error`] -- Agent error types.

pub mod error;
pub mod llm;
pub mod roast;

pub use error::{AgentError, Result};
pub use llm::{
    BedrockAuth, BedrockClient, BedrockConfig, ChatRequest, DEFAULT_MODEL_ID, LlmResponse, Message,
    Role,
};
pub use roast::{BedrockRoastGenerator, MAX_ROAST_TOKENS, ROAST_PROMPT, RoastGenerator};
