//! Per-session state and the process-wide session registry.
//!
//! A [`Session`] moves through three phases:
//!
//! ```text
//! Empty --upload--> Indexed --ask--> Conversing --ask--> Conversing
//!   ^                  |                 |
//!   +----reset / re-upload---------------+
//! ```
//!
//! Uploading is split so that slow ingestion never holds the session:
//! [`Session::begin_upload`] clears the session and hands out an
//! [`UploadTicket`]; [`UploadTicket::run`] does the work without touching the
//! session; [`Session::commit`] installs the result only if nothing else
//! happened to the session in the meantime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use docqa_model::Llm;
use docqa_rag::{Document, EmbeddingProvider, IngestionPipeline, RagConfig, VectorIndex};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{Answer, ConversationEngine, EngineConfig};
use crate::error::{ChatError, SessionError};
use crate::history::ConversationHistory;
use crate::metadata::{ExtractorConfig, MetadataExtractor, PaperMetadata};

/// Reply given when a question arrives before any document content.
pub const UPLOAD_REQUIRED_MESSAGE: &str = "Please upload at least one PDF file first.";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Nothing indexed.
    Empty,
    /// Documents indexed, no question answered yet.
    Indexed,
    /// At least one question answered.
    Conversing,
}

/// Outcome of [`Session::ask`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionReply {
    /// No document content is indexed; nothing was sent to any backend.
    UploadRequired,
    /// A grounded answer.
    Answer(Answer),
}

impl SessionReply {
    /// The text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Self::UploadRequired => UPLOAD_REQUIRED_MESSAGE,
            Self::Answer(answer) => &answer.text,
        }
    }
}

/// The shared, stateless collaborators every session uses.
#[derive(Clone, Debug)]
pub struct ChatServices {
    pipeline: IngestionPipeline,
    engine: ConversationEngine,
    extractor: MetadataExtractor,
}

impl ChatServices {
    /// Wire the services around one embedding provider and one model.
    ///
    /// # Errors
    ///
    /// Returns [`docqa_rag::RagError::ConfigError`] if `rag_config` describes
    /// an invalid chunk window.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn Llm>,
        rag_config: RagConfig,
        engine_config: EngineConfig,
        extractor_config: ExtractorConfig,
    ) -> docqa_rag::Result<Self> {
        let pipeline = IngestionPipeline::builder()
            .config(rag_config)
            .embedding_provider(embedding_provider)
            .build()?;
        let embedder = pipeline.embedder().clone();
        let engine = ConversationEngine::new(embedder, llm.clone(), engine_config);
        let extractor = MetadataExtractor::with_config(llm, extractor_config);
        Ok(Self { pipeline, engine, extractor })
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn extractor(&self) -> &MetadataExtractor {
        &self.extractor
    }
}

/// Permission to ingest a batch of documents into a session.
///
/// Carries the session generation it was issued under.
#[derive(Debug)]
pub struct UploadTicket {
    generation: u64,
    services: ChatServices,
}

/// The finished result of an [`UploadTicket`], ready to commit.
#[derive(Debug)]
pub struct IngestedBatch {
    generation: u64,
    index: VectorIndex,
    documents: Vec<String>,
    metadata: Vec<PaperMetadata>,
}

impl IngestedBatch {
    pub fn metadata(&self) -> &[PaperMetadata] {
        &self.metadata
    }
}

impl UploadTicket {
    /// Generation this ticket was issued under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Chunk, embed, and index `documents`, and extract their metadata.
    ///
    /// Index construction and metadata extraction run concurrently. Metadata
    /// never fails; the index does.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Ingestion`] if the index cannot be built.
    pub async fn run(self, documents: Vec<Document>) -> Result<IngestedBatch, SessionError> {
        let documents = unique_document_ids(documents);
        let (index, metadata) = futures::join!(
            self.services.pipeline.build_index(&documents),
            self.services.extractor.extract_all(&documents),
        );
        let index = index?;
        info!(
            generation = self.generation,
            documents = documents.len(),
            chunks = index.len(),
            "ingested documents"
        );
        Ok(IngestedBatch {
            generation: self.generation,
            index,
            documents: documents.into_iter().map(|d| d.id).collect(),
            metadata,
        })
    }
}

/// Rename repeated document ids to `name#2`, `name#3`, ... in upload order.
pub fn unique_document_ids(mut documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::with_capacity(documents.len());
    for document in &mut documents {
        if seen.insert(document.id.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}#{n}", document.id);
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}#{n}", document.id);
        }
        debug!(document = %document.id, renamed = %candidate, "duplicate document name");
        seen.insert(candidate.clone());
        document.id = candidate;
    }
    documents
}

/// Everything a session knows, in serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub documents: Vec<String>,
    pub metadata: Vec<PaperMetadata>,
    pub history: ConversationHistory,
    pub index: VectorIndex,
}

/// One user's documents, index, and conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    services: ChatServices,
    generation: u64,
    index: VectorIndex,
    history: ConversationHistory,
    documents: Vec<String>,
    metadata: Vec<PaperMetadata>,
}

impl Session {
    /// A new, empty session.
    pub fn new(id: impl Into<String>, services: ChatServices) -> Self {
        Self {
            id: id.into(),
            services,
            generation: 0,
            index: VectorIndex::empty(),
            history: ConversationHistory::new(),
            documents: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.index.is_empty() {
            SessionPhase::Empty
        } else if self.history.is_empty() {
            SessionPhase::Indexed
        } else {
            SessionPhase::Conversing
        }
    }

    /// Incremented by every upload and reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Names of the uploaded documents, in upload order.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// One record per uploaded document, in upload order.
    pub fn metadata(&self) -> &[PaperMetadata] {
        &self.metadata
    }

    /// Discard documents, index, and history. Any upload still running is
    /// invalidated.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.index = VectorIndex::empty();
        self.history = ConversationHistory::new();
        self.documents.clear();
        self.metadata.clear();
        info!(session = %self.id, generation = self.generation, "session reset");
    }

    /// Start a new upload: reset the session and issue a ticket.
    pub fn begin_upload(&mut self) -> UploadTicket {
        self.reset();
        UploadTicket { generation: self.generation, services: self.services.clone() }
    }

    /// Install a finished batch.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stale`] if the session was reset or re-uploaded
    /// after the batch's ticket was issued; the batch is dropped.
    pub fn commit(&mut self, batch: IngestedBatch) -> Result<(), SessionError> {
        if batch.generation != self.generation {
            warn!(
                session = %self.id,
                started = batch.generation,
                current = self.generation,
                "discarding stale ingestion result"
            );
            return Err(SessionError::Stale { started: batch.generation, current: self.generation });
        }
        self.index = batch.index;
        self.documents = batch.documents;
        self.metadata = batch.metadata;
        debug!(session = %self.id, phase = ?self.phase(), "committed upload");
        Ok(())
    }

    /// Replace the session contents with `documents`.
    ///
    /// Returns the extracted metadata, one record per document.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Ingestion`] if indexing fails; the session is
    /// then left empty.
    pub async fn upload(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<&[PaperMetadata], SessionError> {
        let ticket = self.begin_upload();
        let batch = ticket.run(documents).await?;
        self.commit(batch)?;
        Ok(self.metadata.as_slice())
    }

    /// Answer a question from the uploaded documents.
    ///
    /// In the [`SessionPhase::Empty`] phase this returns
    /// [`SessionReply::UploadRequired`] without calling any backend.
    ///
    /// # Errors
    ///
    /// Propagates [`ChatError`] from the engine; history is then unchanged.
    pub async fn ask(&mut self, question: &str) -> Result<SessionReply, ChatError> {
        if self.index.is_empty() {
            info!(session = %self.id, "question asked before upload");
            return Ok(SessionReply::UploadRequired);
        }
        let answer = self.services.engine.answer(question, &mut self.history, &self.index).await?;
        Ok(SessionReply::Answer(answer))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            documents: self.documents.clone(),
            metadata: self.metadata.clone(),
            history: self.history.clone(),
            index: self.index.clone(),
        }
    }

    /// Replace the session contents with a snapshot. Invalidates running uploads.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.generation += 1;
        self.documents = snapshot.documents;
        self.metadata = snapshot.metadata;
        self.history = snapshot.history;
        self.index = snapshot.index;
    }
}

/// Registry of live sessions, each behind its own lock.
///
/// Operations on different sessions never contend; operations on one session
/// are serialized.
#[derive(Debug, Clone)]
pub struct SessionManager {
    services: ChatServices,
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl SessionManager {
    pub fn new(services: ChatServices) -> Self {
        Self { services, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Create an empty session and return its id.
    pub async fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), self.services.clone());
        self.sessions.write().await.insert(session_id.clone(), Arc::new(Mutex::new(session)));
        debug!(session = %session_id, "created session");
        session_id
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session. Returns `false` if it did not exist.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn session(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, SessionError> {
        self.get(session_id).await.ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Upload documents into a session without holding its lock while
    /// ingesting. A reset or newer upload that lands meanwhile wins.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], [`SessionError::Ingestion`], or
    /// [`SessionError::Stale`] if the result was superseded.
    pub async fn upload(
        &self,
        session_id: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<PaperMetadata>, SessionError> {
        let session = self.session(session_id).await?;
        let ticket = session.lock().await.begin_upload();
        let batch = ticket.run(documents).await?;
        let metadata = batch.metadata().to_vec();
        session.lock().await.commit(batch)?;
        Ok(metadata)
    }

    /// Ask a question in a session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] or [`SessionError::Chat`].
    pub async fn ask(
        &self,
        session_id: &str,
        question: &str,
    ) -> Result<SessionReply, SessionError> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        Ok(session.ask(question).await?)
    }

    /// Reset a session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`].
    pub async fn reset(&self, session_id: &str) -> Result<(), SessionError> {
        self.session(session_id).await?.lock().await.reset();
        Ok(())
    }
}
