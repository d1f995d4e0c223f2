//! # docqa-model
//!
//! Language model clients for document question answering.
//!
//! ## Overview
//!
//! - [`Llm`] - single-turn text generation behind one async trait
//! - [`GeminiModel`] - Google's Gemini models (`gemini` feature)
//! - [`OpenAIClient`] - OpenAI and compatible servers (`openai` feature)
//! - [`MockLlm`] - scripted model for tests
//! - [`retry`] - caller-side bounded retry with exponential backoff
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docqa_model::{GeminiModel, Llm, LlmRequest};
//!
//! let model = GeminiModel::new(std::env::var("GOOGLE_API_KEY")?, "gemini-1.5-pro")?;
//! let text = model.generate(&LlmRequest::new("Hello").with_temperature(0.7)).await?;
//! ```
//!
//! ## Supported Models
//!
//! | Model | Description |
//! |-------|-------------|
//! | `gemini-1.5-pro` | Default Gemini chat model |
//! | `gpt-4o-mini` | Default OpenAI chat model |

pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod llm;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;

pub use error::{ModelError, Result};
#[cfg(feature = "gemini")]
pub use gemini::GeminiModel;
pub use llm::{Llm, LlmRequest, generate_within};
pub use mock::MockLlm;
#[cfg(feature = "openai")]
pub use openai::{OpenAIClient, OpenAIConfig};
pub use retry::{RetryPolicy, retry_with_backoff};
