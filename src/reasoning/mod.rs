//! Reasoning service integration.
//!
//! Defines the `ReasoningService` trait used by agents, the aggregator
//! and the planner to obtain structured (JSON) or free-text output from
//! a generative model. A Gemini-backed implementation lives in
//! `gemini.rs`; tests substitute scripted fakes.

pub mod gemini;

use async_trait::async_trait;
use serde_json::Value;

/// One request to the reasoning service.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub prompt: String,
    /// When set, the service must return valid JSON; callers still
    /// validate shape and fall back on mis-shaped output.
    pub strict_json: bool,
    pub max_output_tokens: Option<u32>,
}

impl ReasoningRequest {
    /// A request whose response must parse as JSON.
    pub fn json(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            strict_json: true,
            max_output_tokens: None,
        }
    }

    /// A free-text request; the response is wrapped as a JSON string.
    pub fn text(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            strict_json: false,
            max_output_tokens: None,
        }
    }
}

/// Errors surfaced by reasoning implementations. Callers treat every
/// variant as recoverable and apply their documented fallbacks.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Response was not valid JSON: {0}")]
    MalformedJson(String),

    #[error("All {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Abstraction over generative reasoning backends.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Generate a response. For `strict_json` requests the returned
    /// `Value` is the parsed document; otherwise it is a JSON string.
    async fn generate(&self, request: &ReasoningRequest) -> Result<Value, ReasoningError>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}
