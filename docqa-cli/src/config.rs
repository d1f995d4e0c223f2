//! Environment configuration.
//!
//! Settings come from the process environment, after loading `.env` from the
//! working directory if one exists. Every setting has a default except the
//! API key of the selected backend.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use docqa_chat::{ChatServices, EngineConfig, ExtractorConfig};
use docqa_model::openai::{OpenAIClient, OpenAIConfig};
use docqa_model::{GeminiModel, Llm, RetryPolicy};
use docqa_rag::gemini::GeminiEmbeddingProvider;
use docqa_rag::openai::OpenAIEmbeddingProvider;
use docqa_rag::{EmbeddingProvider, RagConfig};

/// Default dimension assumed for a custom Gemini embedding model.
const GEMINI_EMBEDDING_DIMENSIONS: usize = 768;

/// Which vendor serves both embeddings and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gemini,
    OpenAI,
}

impl Backend {
    fn default_chat_model(self) -> &'static str {
        match self {
            Self::Gemini => docqa_model::gemini::DEFAULT_MODEL,
            Self::OpenAI => docqa_model::openai::DEFAULT_MODEL,
        }
    }

    fn key_variable(self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            other => bail!("unknown backend '{other}', expected 'gemini' or 'openai'"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
        })
    }
}

/// Resolved application settings.
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub backend: Backend,
    pub api_key: String,
    /// OpenAI-compatible API root; `None` uses the hosted API.
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub answer_temperature: f32,
    pub metadata_temperature: f32,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub memory: bool,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend", &self.backend)
            .field("api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("answer_temperature", &self.answer_temperature)
            .field("metadata_temperature", &self.metadata_temperature)
            .field("top_k", &self.top_k)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("memory", &self.memory)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value '{raw}' for {name}: {e}")),
        _ => Ok(default),
    }
}

fn parse_switch(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool> {
    let Some(raw) = lookup(name) else { return Ok(default) };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => bail!("invalid value '{raw}' for {name}, expected on or off"),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from a variable lookup.
    ///
    /// # Errors
    ///
    /// Fails if the backend is unknown, its API key is missing, or a numeric
    /// or switch value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match non_empty(&lookup, "DOCQA_LLM_BACKEND") {
            Some(raw) => raw.parse()?,
            None => Backend::Gemini,
        };
        let api_key = non_empty(&lookup, backend.key_variable()).with_context(|| {
            format!("{} must be set for the {backend} backend", backend.key_variable())
        })?;

        Ok(Self {
            backend,
            api_key,
            openai_base_url: non_empty(&lookup, "DOCQA_OPENAI_BASE_URL"),
            chat_model: non_empty(&lookup, "DOCQA_CHAT_MODEL")
                .unwrap_or_else(|| backend.default_chat_model().to_string()),
            embedding_model: non_empty(&lookup, "DOCQA_EMBEDDING_MODEL"),
            embedding_dimensions: match non_empty(&lookup, "DOCQA_EMBEDDING_DIMENSIONS") {
                Some(_) => Some(parse_var(&lookup, "DOCQA_EMBEDDING_DIMENSIONS", 0)?),
                None => None,
            },
            answer_temperature: parse_var(&lookup, "DOCQA_ANSWER_TEMPERATURE", 0.7)?,
            metadata_temperature: parse_var(&lookup, "DOCQA_METADATA_TEMPERATURE", 0.2)?,
            top_k: parse_var(&lookup, "DOCQA_TOP_K", 4)?,
            chunk_size: parse_var(&lookup, "DOCQA_CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_var(&lookup, "DOCQA_CHUNK_OVERLAP", 200)?,
            memory: parse_switch(&lookup, "DOCQA_MEMORY", true)?,
            timeout: Duration::from_secs(parse_var(&lookup, "DOCQA_TIMEOUT_SECS", 60)?),
            max_retries: parse_var(&lookup, "DOCQA_MAX_RETRIES", 3)?,
        })
    }

    /// # Errors
    ///
    /// Fails if the chunk window or `top_k` is invalid.
    pub fn rag_config(&self) -> Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .build()
            .context("invalid chunking configuration")
    }

    /// # Errors
    ///
    /// Fails if `top_k`, the timeout, or the temperature is invalid.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::builder()
            .top_k(self.top_k)
            .memory_enabled(self.memory)
            .temperature(self.answer_temperature)
            .timeout(self.timeout)
            .build()
            .context("invalid answer configuration")
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            temperature: self.metadata_temperature,
            timeout: self.timeout,
            ..ExtractorConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    /// Construct the embedding provider for the selected backend.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match self.backend {
            Backend::Gemini => {
                let mut provider = GeminiEmbeddingProvider::new(&self.api_key)?;
                if let Some(model) = &self.embedding_model {
                    let dimensions =
                        self.embedding_dimensions.unwrap_or(GEMINI_EMBEDDING_DIMENSIONS);
                    provider = provider.with_model(model, dimensions);
                }
                Arc::new(provider.with_timeout(self.timeout)?)
            }
            Backend::OpenAI => {
                let mut provider = OpenAIEmbeddingProvider::new(&self.api_key)?;
                if let Some(base_url) = &self.openai_base_url {
                    provider = provider.with_base_url(base_url);
                }
                if let Some(model) = &self.embedding_model {
                    provider = provider.with_model(model);
                }
                if let Some(dimensions) = self.embedding_dimensions {
                    provider = provider.with_dimensions(dimensions);
                }
                Arc::new(provider.with_timeout(self.timeout)?)
            }
        };
        Ok(provider)
    }

    /// Construct the chat model for the selected backend.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn llm(&self) -> Result<Arc<dyn Llm>> {
        let llm: Arc<dyn Llm> = match self.backend {
            Backend::Gemini => Arc::new(
                GeminiModel::new(&self.api_key, &self.chat_model)?.with_timeout(self.timeout)?,
            ),
            Backend::OpenAI => {
                let config = match &self.openai_base_url {
                    Some(base_url) => {
                        OpenAIConfig::compatible(&self.api_key, base_url, &self.chat_model)
                    }
                    None => OpenAIConfig::new(&self.api_key, &self.chat_model),
                };
                Arc::new(OpenAIClient::new(config)?.with_timeout(self.timeout)?)
            }
        };
        Ok(llm)
    }

    /// Wire everything the chat session needs.
    ///
    /// # Errors
    ///
    /// Fails on any invalid setting or client construction error.
    pub fn services(&self) -> Result<ChatServices> {
        Ok(ChatServices::new(
            self.embedding_provider()?,
            self.llm()?,
            self.rag_config()?,
            self.engine_config()?,
            self.extractor_config(),
        )?)
    }
}
