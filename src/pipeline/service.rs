//! `PassageService`: the operations exposed to callers.
//!
//! Wraps an [`AlignmentGenerator`] and an [`AlignmentStore`].  A passage is
//! persisted exactly once, after every generation stage has succeeded.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analysis::BilingualAlignment;
use crate::llm::vocabulary_from_words;
use crate::pipeline::generator::{AlignmentGenerator, GenerationError};
use crate::storage::{parse_id, AlignmentStore, PassageRecord, PassageSummary, StorageError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct PassageService {
    generator: AlignmentGenerator,
    store: Arc<dyn AlignmentStore>,
}

impl PassageService {
    pub fn new(generator: AlignmentGenerator, store: Arc<dyn AlignmentStore>) -> Self {
        Self { generator, store }
    }

    /// Generate, align and persist a passage for `words`.
    ///
    /// Blank words are dropped; an empty vocabulary is rejected before any
    /// provider is called.
    pub async fn create_aligned_passage(
        &self,
        words: &[String],
        cancel: &CancellationToken,
    ) -> Result<PassageRecord, ServiceError> {
        let vocabulary = vocabulary_from_words(words);
        if vocabulary.is_empty() {
            return Err(ServiceError::InvalidInput(
                "vocabulary must contain at least one non-blank word".into(),
            ));
        }
        log::info!("service: creating passage for {} vocabulary items", vocabulary.len());

        let generated = self.generator.generate(&vocabulary, cancel).await.map_err(|e| {
            log::error!("service: generation failed at {} stage: {e}", e.stage());
            e
        })?;

        let record = PassageRecord {
            id: Uuid::new_v4(),
            passage_text: generated.passage_text,
            vocabulary,
            alignment: generated.alignment,
            generation_prompt: generated.generation_prompt,
            analysis_request: generated.analysis_request,
            raw_analysis_response: generated.raw_analysis_response,
            created_at: Utc::now(),
        };
        self.store.persist(&record, &generated.audio).await?;
        Ok(record)
    }

    /// The full stored record for `id`.
    pub async fn get_record(&self, id: &str) -> Result<PassageRecord, ServiceError> {
        Ok(self.store.retrieve(parse_id(id)?).await?)
    }

    pub async fn get_alignment(&self, id: &str) -> Result<BilingualAlignment, ServiceError> {
        Ok(self.get_record(id).await?.alignment)
    }

    pub async fn get_audio(&self, id: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(self.store.audio(parse_id(id)?).await?)
    }

    /// Stored passages, newest first.
    pub async fn list_passages(&self) -> Result<Vec<PassageSummary>, ServiceError> {
        Ok(self.store.list().await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CompletenessPolicy;
    use crate::config::GenerationConfig;
    use crate::llm::{MockTextProvider, RetryPolicy};
    use crate::speech::MockSynthesizer;
    use crate::storage::LocalStore;
    use tempfile::tempdir;

    const PASSAGE: &str = "Qué quilombo";

    const ANALYSIS: &str = r#"{
        "indexed_spanish_words": {
            "0": {"text": "Qué", "vocabulary_id": null},
            "1": {"text": "quilombo", "vocabulary_id": 0}
        },
        "indexed_english_translation_words": ["What", "a", "mess"],
        "alignment_spanish_to_english": {"0": [0, 1], "1": [2]}
    }"#;

    fn service(
        text: MockTextProvider,
        dir: &std::path::Path,
    ) -> (PassageService, Arc<MockTextProvider>) {
        let text = Arc::new(text);
        let config = GenerationConfig {
            completeness: CompletenessPolicy::Strict,
            retry: RetryPolicy::no_retry(),
        };
        let generator = AlignmentGenerator::new(
            text.clone(),
            Arc::new(MockSynthesizer::speaking(PASSAGE)),
            &config,
        );
        let store = Arc::new(LocalStore::new(dir));
        (PassageService::new(generator, store), text)
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn create_persists_and_reads_back() {
        let dir = tempdir().expect("temp dir");
        let (service, _) = service(MockTextProvider::new(PASSAGE, ANALYSIS), dir.path());

        let record = service
            .create_aligned_passage(&words(&["quilombo"]), &CancellationToken::new())
            .await
            .unwrap();
        let id = record.id.to_string();

        assert_eq!(service.get_alignment(&id).await.unwrap(), record.alignment);
        assert!(!service.get_audio(&id).await.unwrap().is_empty());
        assert_eq!(service.get_record(&id).await.unwrap().vocabulary, record.vocabulary);

        let listed = service.list_passages().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].passage_text, PASSAGE);
    }

    #[tokio::test]
    async fn empty_vocabulary_is_rejected_without_calls() {
        let dir = tempdir().expect("temp dir");
        let (service, text) = service(MockTextProvider::new(PASSAGE, ANALYSIS), dir.path());

        let err = service
            .create_aligned_passage(&words(&["", "   "]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(text.text_calls(), 0);
    }

    #[tokio::test]
    async fn failed_generation_persists_nothing() {
        let dir = tempdir().expect("temp dir");
        let (service, _) = service(MockTextProvider::new(PASSAGE, "no json here"), dir.path());

        let err = service
            .create_aligned_passage(&words(&["quilombo"]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Generation(GenerationError::Parse { .. })));
        assert!(service.list_passages().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn lookups_validate_ids() {
        let dir = tempdir().expect("temp dir");
        let (service, _) = service(MockTextProvider::new(PASSAGE, ANALYSIS), dir.path());

        assert!(matches!(
            service.get_alignment("not-a-uuid").await,
            Err(ServiceError::Storage(StorageError::InvalidId(_)))
        ));
        assert!(matches!(
            service.get_audio(&Uuid::new_v4().to_string()).await,
            Err(ServiceError::Storage(StorageError::NotFound(_)))
        ));
    }
}
