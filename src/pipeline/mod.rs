//! Passage generation pipeline.
//!
//! This module wires the passage → speech → analysis sequence and exposes
//! the service that persists its results.
//!
//! # Architecture
//!
//! ```text
//! PassageService::create_aligned_passage(words, &token)
//!        │
//!        ├─ vocabulary_from_words          (reject empty)
//!        │
//!        ├─ AlignmentGenerator::generate
//!        │     ├─ TextProvider::generate_text          [Passage]
//!        │     ├─ SpeechSynthesizer + timing extractor [Speech]
//!        │     └─ TextProvider::generate_json
//!        │          + parse_analysis + reconcile       [Analysis]
//!        │
//!        └─ AlignmentStore::persist        (only after all stages succeed)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use aligned_reader::config::AppConfig;
//! use aligned_reader::llm::build_provider;
//! use aligned_reader::pipeline::{AlignmentGenerator, PassageService};
//! use aligned_reader::speech::ElevenLabsSynthesizer;
//! use aligned_reader::storage::LocalStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = AppConfig::load().unwrap();
//!     config.apply_env_overrides();
//!
//!     let generator = AlignmentGenerator::new(
//!         build_provider(&config.llm).unwrap(),
//!         Arc::new(ElevenLabsSynthesizer::from_config(&config.speech).unwrap()),
//!         &config.generation,
//!     );
//!     let store = Arc::new(LocalStore::new(config.storage.resolved_dir()));
//!     let service = PassageService::new(generator, store);
//!
//!     let words = vec!["che".to_string(), "laburo".to_string()];
//!     let record = service
//!         .create_aligned_passage(&words, &CancellationToken::new())
//!         .await
//!         .unwrap();
//!     println!("{} {}", record.id, record.passage_text);
//! }
//! ```

pub mod generator;
pub mod service;
pub mod stage;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use generator::{AlignmentGenerator, GeneratedPassage, GenerationError};
pub use service::{PassageService, ServiceError};
pub use stage::Stage;
