//! Gemini client using the Generative Language `generateContent` endpoint.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::llm::{Llm, LlmRequest};

const PROVIDER: &str = "Gemini";

/// The default Generative Language API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default chat model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// An [`Llm`] backed by Gemini.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_model::GeminiModel;
///
/// let model = GeminiModel::new(std::env::var("GOOGLE_API_KEY")?, "gemini-1.5-pro")?;
/// ```
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    name: String,
}

impl GeminiModel {
    /// Create a client for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if the key is empty.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ModelError::Config("Gemini API key must not be empty".into()));
        }
        let model = model.into();
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            name: format!("gemini/{model}"),
            model,
        })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
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

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl Llm for GeminiModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = request.prompt.len(),
            temperature = ?request.temperature,
            "generating content"
        );

        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: &request.prompt }] }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
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

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            ModelError::InvalidResponse { provider: PROVIDER.into(), message: e.to_string() }
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse { provider: PROVIDER.into() });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model() {
        let model = GeminiModel::new("k", "gemini-1.5-pro").unwrap().with_base_url("http://h/v1/");
        assert_eq!(model.endpoint(), "http://h/v1/models/gemini-1.5-pro:generateContent");
        assert_eq!(model.name(), "gemini/gemini-1.5-pro");
    }

    #[test]
    fn request_body_uses_generation_config() {
        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts: vec![Part { text: "hi" }] }],
            generation_config: GenerationConfig { temperature: Some(0.7), max_output_tokens: None },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn rejects_empty_key() {
        assert!(matches!(GeminiModel::new("", "m"), Err(ModelError::Config(_))));
    }
}
