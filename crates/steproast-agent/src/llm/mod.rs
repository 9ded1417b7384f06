//! LLM client and wire types.
//!
//! - [`types`] -- provider-agnostic request/response types.
//! - [`client`] -- AWS Bedrock Runtime client.

pub mod client;
pub mod types;

pub use client::{BedrockAuth, BedrockClient, BedrockConfig, DEFAULT_MODEL_ID};
pub use types::{ChatRequest, LlmResponse, Message, Role, StopReason, Usage};
