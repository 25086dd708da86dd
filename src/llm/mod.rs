//! Text-completion layer for passage generation and bilingual analysis.
//!
//! This module provides:
//! * [`TextProvider`]: async trait implemented by all provider backends.
//! * [`AnthropicProvider`]: Anthropic Messages API.
//! * [`OpenAiCompatibleProvider`]: Grok, OpenAI and any chat-completions API.
//! * [`build_provider`]: picks a backend from [`LlmConfig`](crate::config::LlmConfig).
//! * [`with_backoff`] / [`RetryPolicy`]: bounded, cancellable retry.
//! * [`PromptBuilder`]: passage and analysis prompts.
//! * [`VocabularyItem`] / [`PhraseBook`]: vocabulary sent to the model and
//!   the learner's saved phrases.
//! * [`LlmError`]: error variants for provider calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use aligned_reader::config::AppConfig;
//! use aligned_reader::llm::{build_provider, vocabulary_from_words, PromptBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = AppConfig::default();
//!     config.apply_env_overrides();
//!
//!     let provider = build_provider(&config.llm).unwrap();
//!     let vocabulary = vocabulary_from_words(&["che", "laburo"]);
//!     let (system, user) = PromptBuilder::new().passage_chat(&vocabulary);
//!
//!     let passage = provider.generate_text(&user, &system).await.unwrap();
//!     println!("{}", passage);
//! }
//! ```

pub mod anthropic;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod vocabulary;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatibleProvider;
pub use prompt::{prompt_transcript, PromptBuilder};
pub use provider::{build_provider, LlmError, LlmResponse, TextProvider};
pub use retry::{with_backoff, RetryError, RetryPolicy, Transient};
pub use vocabulary::{
    vocabulary_from_words, PhraseBook, PhraseEntry, PhraseError, PhraseUpdate, VocabularyId,
    VocabularyItem,
};

// test-only re-export so the pipeline tests can script provider responses.
#[cfg(test)]
pub use provider::MockTextProvider;
