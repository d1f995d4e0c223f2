//! OpenAI-compatible chat completions client.
//!
//! This module is only available when the `openai` feature is enabled. Works
//! with any server implementing `/chat/completions` (Ollama, vLLM, etc.) via
//! [`OpenAIConfig::compatible`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::llm::{Llm, LlmRequest};

const PROVIDER: &str = "OpenAI";

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for [`OpenAIClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAIConfig {
    /// Bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API root, without the `/chat/completions` suffix.
    pub base_url: String,
}

impl OpenAIConfig {
    /// Settings for the hosted OpenAI API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), model: model.into(), base_url: DEFAULT_BASE_URL.into() }
    }

    /// Settings for an OpenAI-compatible server.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// An [`Llm`] backed by an OpenAI-compatible chat completions endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_model::openai::{OpenAIClient, OpenAIConfig};
///
/// let model = OpenAIClient::new(OpenAIConfig::new(
///     std::env::var("OPENAI_API_KEY")?,
///     "gpt-4o-mini",
/// ))?;
/// ```
pub struct OpenAIClient {
    client: reqwest::Client,
    config: OpenAIConfig,
    name: String,
}

impl OpenAIClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if the model name is empty.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.model.is_empty() {
            return Err(ModelError::Config("OpenAI model must not be empty".into()));
        }
        let name = format!("openai/{}", config.model);
        Ok(Self { client: reqwest::Client::new(), name, config })
    }

    /// Apply a transport-level timeout to every request.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Llm implementation ─────────────────────────────────────────────

#[async_trait]
impl Llm for OpenAIClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            temperature = ?request.temperature,
            "creating chat completion"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                ModelError::from_transport(PROVIDER, &e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(ModelError::from_status(PROVIDER, status, detail));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            ModelError::InvalidResponse { provider: PROVIDER.into(), message: e.to_string() }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ModelError::EmptyResponse { provider: PROVIDER.into() })
    }
}
