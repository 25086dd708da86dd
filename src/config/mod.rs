//! Configuration module for aligned-reader.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each
//! collaborator (LLM, speech, storage, generation), `AppPaths` for
//! cross-platform directories, TOML persistence via `AppConfig::load` /
//! `AppConfig::save`, and environment-variable overrides for secrets.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, GenerationConfig, LlmConfig, LlmProvider, SpeechConfig, StorageConfig,
};
