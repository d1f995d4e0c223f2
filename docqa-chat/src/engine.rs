//! Grounded question answering over an indexed document set.
//!
//! [`ConversationEngine::answer`] embeds the question, retrieves the top-k
//! chunks, assembles one prompt with the retrieved context and recent
//! history, and makes exactly one model call. The history grows by one turn
//! on success and is untouched on any error. Nothing here retries.

use std::sync::Arc;
use std::time::Duration;

use docqa_model::{Llm, LlmRequest, generate_within};
use docqa_rag::{Embedder, SearchResult, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::history::ConversationHistory;
use crate::prompt::AnswerPrompt;

/// Settings for [`ConversationEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Include prior turns in the prompt.
    pub memory_enabled: bool,
    /// Upper bound on prior turns included in the prompt.
    pub max_history_turns: usize,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Deadline for one model call.
    pub timeout: Duration,
    /// Optional cap on generated tokens.
    pub max_output_tokens: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            memory_enabled: true,
            max_history_turns: 10,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
            max_output_tokens: None,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for constructing an [`EngineConfig`].
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set how many chunks are retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Include earlier turns in the prompt.
    pub fn memory_enabled(mut self, enabled: bool) -> Self {
        self.config.memory_enabled = enabled;
        self
    }

    /// Set how many recent turns the prompt may carry.
    pub fn max_history_turns(mut self, turns: usize) -> Self {
        self.config.max_history_turns = turns;
        self
    }

    /// Set the sampling temperature for answers.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the deadline for one model call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Cap the length of generated answers (`None` leaves it to the model).
    pub fn max_output_tokens(mut self, tokens: Option<u32>) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Build the [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if `top_k` is zero, the timeout is zero,
    /// or the temperature is negative or not finite.
    pub fn build(self) -> Result<EngineConfig> {
        let config = self.config;
        if config.top_k == 0 {
            return Err(ChatError::Config("top_k must be greater than zero".into()));
        }
        if config.timeout.is_zero() {
            return Err(ChatError::Config("timeout must be greater than zero".into()));
        }
        if !config.temperature.is_finite() || config.temperature < 0.0 {
            return Err(ChatError::Config(format!(
                "temperature must be a non-negative number, got {}",
                config.temperature
            )));
        }
        Ok(config)
    }
}

/// A grounded answer and the passages it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Retrieved passages, best first.
    pub sources: Vec<SearchResult>,
}

impl Answer {
    /// Distinct source documents in ranking order.
    pub fn documents(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for source in &self.sources {
            let id = source.chunk.document_id.as_str();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// Answers questions against a [`VectorIndex`] with a language model.
#[derive(Clone)]
pub struct ConversationEngine {
    embedder: Embedder,
    llm: Arc<dyn Llm>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(embedder: Embedder, llm: Arc<dyn Llm>, config: EngineConfig) -> Self {
        Self { embedder, llm, config }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The embedder used for questions.
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// The answering model.
    pub fn llm(&self) -> &Arc<dyn Llm> {
        &self.llm
    }

    /// Answer `question` from the passages of `index`.
    ///
    /// On success the turn is appended to `history`.
    ///
    /// # Errors
    ///
    /// - [`ChatError::NoDocuments`] if `index` is empty; no backend is called.
    /// - [`ChatError::BackendUnavailable`] if the question cannot be embedded.
    /// - [`ChatError::GenerationFailed`] if the model fails or times out.
    ///
    /// `history` is unchanged on every error.
    pub async fn answer(
        &self,
        question: &str,
        history: &mut ConversationHistory,
        index: &VectorIndex,
    ) -> Result<Answer> {
        if index.is_empty() {
            return Err(ChatError::NoDocuments);
        }

        let query = self.embedder.embed_query(question).await.inspect_err(|e| {
            warn!(error = %e, "question embedding failed");
        })?;
        let sources = index.search(&query, self.config.top_k).map_err(ChatError::Retrieval)?;

        let turns = if self.config.memory_enabled {
            history.recent(self.config.max_history_turns)
        } else {
            &[]
        };
        let prompt = AnswerPrompt::new(question)
            .context(&sources)
            .history(turns)
            .cite_documents(index.document_ids().len() > 1)
            .build();

        debug!(
            model = self.llm.name(),
            sources = sources.len(),
            history_turns = turns.len(),
            prompt_len = prompt.len(),
            "generating answer"
        );

        let mut request = LlmRequest::new(prompt).with_temperature(self.config.temperature);
        if let Some(tokens) = self.config.max_output_tokens {
            request = request.with_max_output_tokens(tokens);
        }

        let text = generate_within(self.llm.as_ref(), &request, self.config.timeout)
            .await
            .map_err(|e| {
                warn!(model = self.llm.name(), error = %e, "answer generation failed");
                ChatError::GenerationFailed(e)
            })?;

        history.push(question, text.clone());
        info!(sources = sources.len(), history_len = history.len(), "answered question");

        Ok(Answer { text, sources })
    }
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("embedder", &self.embedder)
            .field("llm", &self.llm.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use docqa_model::MockLlm;
    use docqa_rag::mock::HashEmbeddingProvider;
    use docqa_rag::{Document, IngestionPipeline, RagConfig};

    use super::*;

    async fn index_of(provider: Arc<HashEmbeddingProvider>, docs: &[Document]) -> VectorIndex {
        let config = RagConfig::builder().chunk_size(200).chunk_overlap(20).build().unwrap();
        let pipeline = IngestionPipeline::builder()
            .config(config)
            .embedding_provider(provider)
            .build()
            .unwrap();
        pipeline.build_index(docs).await.unwrap()
    }

    fn engine(
        provider: Arc<HashEmbeddingProvider>,
        llm: Arc<MockLlm>,
        config: EngineConfig,
    ) -> ConversationEngine {
        ConversationEngine::new(Embedder::new(provider), llm, config)
    }

    #[test]
    fn builder_validates() {
        assert!(EngineConfig::builder().top_k(0).build().is_err());
        assert!(EngineConfig::builder().temperature(-1.0).build().is_err());
        assert!(EngineConfig::builder().timeout(Duration::ZERO).build().is_err());
        assert_eq!(EngineConfig::builder().build().unwrap(), EngineConfig::default());
    }

    #[tokio::test]
    async fn empty_index_calls_nothing() {
        let provider = Arc::new(HashEmbeddingProvider::new(16));
        let llm = Arc::new(MockLlm::default());
        let engine = engine(provider.clone(), llm.clone(), EngineConfig::default());
        let mut history = ConversationHistory::new();

        let err = engine.answer("q", &mut history, &VectorIndex::empty()).await.unwrap_err();
        assert!(matches!(err, ChatError::NoDocuments));
        assert_eq!(provider.calls(), 0);
        assert_eq!(llm.calls(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn memory_disabled_omits_history() {
        let provider = Arc::new(HashEmbeddingProvider::new(16));
        let index = index_of(provider.clone(), &[Document::new("a.pdf", "Some text.")]).await;
        let llm = Arc::new(MockLlm::new("answer"));
        let config = EngineConfig::builder().memory_enabled(false).build().unwrap();
        let engine = engine(provider, llm.clone(), config);
        let mut history = ConversationHistory::new();

        engine.answer("first question", &mut history, &index).await.unwrap();
        engine.answer("second question", &mut history, &index).await.unwrap();

        assert_eq!(history.len(), 2);
        assert!(!llm.last_prompt().unwrap().contains("first question"));
    }

    #[tokio::test]
    async fn history_is_limited_to_recent_turns() {
        let provider = Arc::new(HashEmbeddingProvider::new(16));
        let index = index_of(provider.clone(), &[Document::new("a.pdf", "Some text.")]).await;
        let llm = Arc::new(MockLlm::new("answer"));
        let config = EngineConfig::builder().max_history_turns(1).build().unwrap();
        let engine = engine(provider, llm.clone(), config);
        let mut history = ConversationHistory::new();

        for q in ["alpha question", "beta question", "gamma question"] {
            engine.answer(q, &mut history, &index).await.unwrap();
        }
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("User: beta question"));
        assert!(!prompt.contains("User: alpha question"));
    }

    #[tokio::test]
    async fn embedding_failure_is_backend_unavailable() {
        let good = Arc::new(HashEmbeddingProvider::new(16));
        let index = index_of(good, &[Document::new("a.pdf", "Some text.")]).await;
        let llm = Arc::new(MockLlm::default());
        let engine = engine(
            Arc::new(HashEmbeddingProvider::unavailable(16)),
            llm.clone(),
            EngineConfig::default(),
        );
        let mut history = ConversationHistory::new();

        let err = engine.answer("q", &mut history, &index).await.unwrap_err();
        assert!(matches!(err, ChatError::BackendUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(llm.calls(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_generation_failure() {
        let provider = Arc::new(HashEmbeddingProvider::new(16));
        let index = index_of(provider.clone(), &[Document::new("a.pdf", "Some text.")]).await;
        let llm = Arc::new(MockLlm::new("late").with_delay(Duration::from_secs(600)));
        let engine = engine(provider, llm, EngineConfig::default());
        let mut history = ConversationHistory::new();

        let err = engine.answer("q", &mut history, &index).await.unwrap_err();
        assert!(matches!(err, ChatError::GenerationFailed(_)));
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn request_uses_answer_temperature() {
        let provider = Arc::new(HashEmbeddingProvider::new(16));
        let index = index_of(provider.clone(), &[Document::new("a.pdf", "Some text.")]).await;
        let llm = Arc::new(MockLlm::new("answer"));
        let engine = engine(provider, llm.clone(), EngineConfig::default());

        let answer =
            engine.answer("q", &mut ConversationHistory::new(), &index).await.unwrap();
        assert_eq!(answer.documents(), vec!["a.pdf"]);
        assert_eq!(llm.requests()[0].temperature, Some(0.7));
    }
}
