//! The language model abstraction.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A single-turn text generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The complete prompt text.
    pub prompt: String,
    /// Sampling temperature; `None` uses the backend default.
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens; `None` uses the backend default.
    pub max_output_tokens: Option<u32>,
}

impl LlmRequest {
    /// Create a request with backend-default sampling.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), temperature: None, max_output_tokens: None }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}

/// A text-in, text-out language model.
///
/// Implementations make exactly one backend call per [`generate`](Llm::generate)
/// and never retry; retry policy belongs to the caller (see [`crate::retry`]).
#[async_trait]
pub trait Llm: Send + Sync {
    /// Provider and model name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `request`.
    async fn generate(&self, request: &LlmRequest) -> Result<String>;
}

/// Run [`Llm::generate`] with a deadline.
///
/// # Errors
///
/// Returns [`ModelError::Timeout`] if the call does not finish within
/// `timeout`, otherwise whatever the model returned.
pub async fn generate_within(
    llm: &dyn Llm,
    request: &LlmRequest,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, llm.generate(request))
        .await
        .map_err(|_| ModelError::Timeout(timeout))?
}
