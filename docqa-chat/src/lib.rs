//! # docqa-chat
//!
//! Conversational question answering over uploaded research papers.
//!
//! ## Overview
//!
//! - [`loader`] - PDF and text files to [`docqa_rag::Document`]s
//! - [`MetadataExtractor`] - one structured [`PaperMetadata`] record per paper
//! - [`ConversationEngine`] - retrieval-grounded answers with conversation memory
//! - [`Session`] / [`SessionManager`] - per-user documents, index and history
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_chat::{ChatServices, EngineConfig, ExtractorConfig, Session, loader};
//! use docqa_rag::RagConfig;
//!
//! let services = ChatServices::new(
//!     embedding_provider,
//!     llm,
//!     RagConfig::default(),
//!     EngineConfig::default(),
//!     ExtractorConfig::default(),
//! )?;
//! let mut session = Session::new("local", services);
//!
//! let paper = loader::load_path("paper.pdf").await?;
//! for row in session.upload(vec![paper]).await? {
//!     println!("{}", row.title);
//! }
//! let reply = session.ask("What accuracy did the model reach?").await?;
//! println!("{}", reply.text());
//! ```

pub mod engine;
pub mod error;
pub mod history;
pub mod loader;
pub mod metadata;
pub mod prompt;
pub mod session;

pub use engine::{Answer, ConversationEngine, EngineConfig, EngineConfigBuilder};
pub use error::{ChatError, DocumentError, Result, SessionError};
pub use history::{ConversationHistory, ConversationTurn};
pub use metadata::{
    ERROR_SENTINEL, ExtractorConfig, FIELD_NAMES, MetadataExtractor, NOT_SPECIFIED, PaperMetadata,
    parse_metadata,
};
pub use prompt::{AnswerPrompt, CITATION_INSTRUCTION, UNANSWERABLE_INSTRUCTION};
pub use session::{
    ChatServices, IngestedBatch, Session, SessionManager, SessionPhase, SessionReply,
    SessionSnapshot, UPLOAD_REQUIRED_MESSAGE, UploadTicket, unique_document_ids,
};
