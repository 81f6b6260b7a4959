//! Gemini reasoning backend.
//!
//! Implements `ReasoningService` against the generateContent API.
//! Handles strict-JSON response mode, code-fence stripping, rate-limit
//! retry with exponential backoff, and primary-to-fallback model
//! failover.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ReasoningError, ReasoningRequest, ReasoningService};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    fallback_model: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: String,
        fallback_model: Option<String>,
    ) -> Result<Self, ReasoningError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ReasoningError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            model,
            fallback_model,
        })
    }

    /// Call one model with retry + backoff, returning the raw text.
    async fn call_model(
        &self,
        model: &str,
        request: &ReasoningRequest,
    ) -> Result<String, ReasoningError> {
        let url = format!("{GEMINI_API_BASE}/{model}:generateContent?key={}", self.api_key);

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
                response_mime_type: request
                    .strict_json
                    .then(|| "application/json".to_string()),
            },
        };

        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, model, "Retrying Gemini API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self.http.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: GenerateResponse = response.json().await.map_err(|e| {
                            ReasoningError::Transport(format!("Failed to parse response: {e}"))
                        })?;

                        let text = parsed
                            .candidates
                            .first()
                            .and_then(|c| c.content.as_ref())
                            .map(|c| {
                                c.parts
                                    .iter()
                                    .filter_map(|p| p.text.as_deref())
                                    .collect::<Vec<_>>()
                                    .join("")
                            })
                            .unwrap_or_default();

                        if text.trim().is_empty() {
                            return Err(ReasoningError::EmptyResponse);
                        }
                        return Ok(text);
                    }

                    // Retryable errors: 429 (rate limit), 500+
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, model, error = %error_text, "Retryable Gemini API error");
                        last_error = format!("HTTP {status}: {error_text}");
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    return Err(ReasoningError::Api {
                        status: status.as_u16(),
                        message: error_text,
                    });
                }
                Err(e) => {
                    warn!(attempt, model, error = %e, "Gemini request failed");
                    last_error = format!("Request error: {e}");
                    continue;
                }
            }
        }

        // The loop makes the initial call plus MAX_RETRIES retries.
        Err(ReasoningError::Exhausted {
            attempts: MAX_RETRIES + 1,
            last: last_error,
        })
    }

    /// Strip markdown code fences that models wrap JSON in.
    pub fn strip_code_fences(text: &str) -> &str {
        let trimmed = text.trim();
        let without_open = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        without_open
            .strip_suffix("```")
            .unwrap_or(without_open)
            .trim()
    }

    /// Parse a strict-JSON response body into a `Value`.
    pub fn parse_json_response(text: &str) -> Result<Value, ReasoningError> {
        let cleaned = Self::strip_code_fences(text);
        serde_json::from_str(cleaned).map_err(|e| {
            let preview: String = cleaned.chars().take(120).collect();
            ReasoningError::MalformedJson(format!("{e} (body starts: {preview:?})"))
        })
    }
}

// ---------------------------------------------------------------------------
// ReasoningService implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn generate(&self, request: &ReasoningRequest) -> Result<Value, ReasoningError> {
        let text = match self.call_model(&self.model, request).await {
            Ok(text) => text,
            Err(primary_err) => {
                let Some(fallback) = &self.fallback_model else {
                    return Err(primary_err);
                };
                warn!(
                    primary = %self.model,
                    fallback = %fallback,
                    error = %primary_err,
                    "Primary model failed, trying fallback"
                );
                self.call_model(fallback, request).await?
            }
        };

        if request.strict_json {
            Self::parse_json_response(&text)
        } else {
            Ok(Value::String(text))
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
