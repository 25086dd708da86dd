//! Alignment generator: drives passage → speech → analysis.
//!
//! # Flow
//!
//! ```text
//! vocabulary
//!   └─▶ [Passage]  PromptBuilder::passage_chat ─▶ TextProvider::generate_text
//!         └─▶ [Speech]  SpeechSynthesizer::synthesize_with_timings
//!               └─▶ extract_word_timings ─▶ index_segments
//!                     └─▶ [Analysis] PromptBuilder::analysis_chat ─▶ TextProvider::generate_json
//!                           └─▶ parse_analysis ─▶ reconcile(policy) ─▶ GeneratedPassage
//! ```
//!
//! Every provider call goes through [`with_backoff`] with the configured
//! [`RetryPolicy`]; the [`CancellationToken`] is checked before each stage
//! and raced against every call and backoff sleep.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::analysis::{
    parse_analysis, reconcile, AlignmentIssue, AnalysisError, BilingualAlignment,
    CompletenessPolicy, VocabularyItem,
};
use crate::config::GenerationConfig;
use crate::llm::{
    prompt_transcript, with_backoff, LlmError, PromptBuilder, RetryError, RetryPolicy,
    TextProvider,
};
use crate::pipeline::stage::Stage;
use crate::speech::{SpeechError, SpeechSynthesizer};
use crate::timing::{extract_word_timings, index_segments};

// ---------------------------------------------------------------------------
// GenerationError
// ---------------------------------------------------------------------------

/// Why a generation run failed.  Every variant names its stage or keeps the
/// raw model output.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A stage produced nothing usable (blank passage, no audio, no words).
    #[error("{stage} stage produced no usable output")]
    EmptyGeneration { stage: Stage },

    /// The analysis response contained no parseable JSON.
    #[error("analysis response is not valid JSON: {reason}")]
    Parse { raw: String, reason: String },

    /// The analysis JSON is missing or mistypes required fields.
    #[error("analysis response failed validation: {}", fields.join("; "))]
    Schema { fields: Vec<String>, raw: String },

    /// The analysis does not cover exactly the spoken word indices.
    #[error("analysis is incomplete: {}", join_issues(problems))]
    Incomplete {
        problems: Vec<AlignmentIssue>,
        raw: String,
    },

    /// A provider call failed (after retries, if the error was transient).
    #[error("{stage} stage failed after {attempts} attempt(s): {source}")]
    Capability {
        stage: Stage,
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{stage} stage cancelled")]
    Cancelled { stage: Stage },
}

fn join_issues(problems: &[AlignmentIssue]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl GenerationError {
    /// The stage the failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            GenerationError::EmptyGeneration { stage }
            | GenerationError::Capability { stage, .. }
            | GenerationError::Cancelled { stage } => *stage,
            GenerationError::Parse { .. }
            | GenerationError::Schema { .. }
            | GenerationError::Incomplete { .. } => Stage::Analysis,
        }
    }

    /// The raw analysis response, for failures that have one.
    pub fn raw(&self) -> Option<&str> {
        match self {
            GenerationError::Parse { raw, .. }
            | GenerationError::Schema { raw, .. }
            | GenerationError::Incomplete { raw, .. } => Some(raw),
            _ => None,
        }
    }

    fn from_retry<E>(stage: Stage, err: RetryError<E>) -> Self
    where
        E: EmptyOutput + std::error::Error + Send + Sync + 'static,
    {
        match err {
            RetryError::Cancelled => GenerationError::Cancelled { stage },
            RetryError::Exhausted { source, .. } if source.is_empty_output() => {
                GenerationError::EmptyGeneration { stage }
            }
            RetryError::Exhausted { attempts, source } => GenerationError::Capability {
                stage,
                attempts,
                source: Box::new(source),
            },
        }
    }
}

/// Provider errors that mean "answered, but with nothing in it".
trait EmptyOutput {
    fn is_empty_output(&self) -> bool;
}

impl EmptyOutput for LlmError {
    fn is_empty_output(&self) -> bool {
        matches!(self, LlmError::EmptyResponse)
    }
}

impl EmptyOutput for SpeechError {
    fn is_empty_output(&self) -> bool {
        matches!(self, SpeechError::EmptyAudio)
    }
}

impl From<AnalysisError> for GenerationError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Parse { reason, raw } => GenerationError::Parse { raw, reason },
            AnalysisError::Schema { fields, raw } => GenerationError::Schema { fields, raw },
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratedPassage
// ---------------------------------------------------------------------------

/// Everything a successful run produced, before persistence.
#[derive(Debug, Clone)]
pub struct GeneratedPassage {
    pub passage_text: String,
    pub audio: Vec<u8>,
    pub alignment: BilingualAlignment,
    pub generation_prompt: String,
    pub analysis_request: serde_json::Value,
    pub raw_analysis_response: String,
}

// ---------------------------------------------------------------------------
// AlignmentGenerator
// ---------------------------------------------------------------------------

/// Runs the three generation stages against the configured providers.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use aligned_reader::config::AppConfig;
/// use aligned_reader::llm::{build_provider, vocabulary_from_words};
/// use aligned_reader::pipeline::AlignmentGenerator;
/// use aligned_reader::speech::ElevenLabsSynthesizer;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let generator = AlignmentGenerator::new(
///     build_provider(&config.llm).unwrap(),
///     Arc::new(ElevenLabsSynthesizer::from_config(&config.speech).unwrap()),
///     &config.generation,
/// );
/// let vocabulary = vocabulary_from_words(&["che", "laburo"]);
/// let passage = generator
///     .generate(&vocabulary, &CancellationToken::new())
///     .await
///     .unwrap();
/// println!("{}", passage.alignment.source_text());
/// # }
/// ```
pub struct AlignmentGenerator {
    text: Arc<dyn TextProvider>,
    speech: Arc<dyn SpeechSynthesizer>,
    prompts: PromptBuilder,
    completeness: CompletenessPolicy,
    retry: RetryPolicy,
}

impl AlignmentGenerator {
    pub fn new(
        text: Arc<dyn TextProvider>,
        speech: Arc<dyn SpeechSynthesizer>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            text,
            speech,
            prompts: PromptBuilder::new(),
            completeness: config.completeness,
            retry: config.retry.clone(),
        }
    }

    /// Generate a passage for `vocabulary` with audio and a complete
    /// bilingual alignment.  All-or-nothing.
    pub async fn generate(
        &self,
        vocabulary: &[VocabularyItem],
        cancel: &CancellationToken,
    ) -> Result<GeneratedPassage, GenerationError> {
        // ── 1. Passage ───────────────────────────────────────────────────
        let stage = Stage::Passage;
        let started = enter(stage, cancel)?;

        let (system, user) = self.prompts.passage_chat(vocabulary);
        let passage = with_backoff(&self.retry, cancel, stage.label(), || {
            self.text.generate_text(&user, &system)
        })
        .await
        .map_err(|e| GenerationError::from_retry(stage, e))?;

        let passage_text = passage.trim().to_string();
        if passage_text.is_empty() {
            return Err(GenerationError::EmptyGeneration { stage });
        }
        let generation_prompt = prompt_transcript(&system, &user);
        log::info!(
            "pipeline: {stage} done via {} ({} chars, {}ms)",
            self.text.name(),
            passage_text.chars().count(),
            started.elapsed().as_millis()
        );

        // ── 2. Speech + word timings ─────────────────────────────────────
        let stage = Stage::Speech;
        let started = enter(stage, cancel)?;

        let speech = with_backoff(&self.retry, cancel, stage.label(), || {
            self.speech.synthesize_with_timings(&passage_text)
        })
        .await
        .map_err(|e| GenerationError::from_retry(stage, e))?;

        if speech.audio.is_empty() {
            return Err(GenerationError::EmptyGeneration { stage });
        }
        let chars = speech.alignment.chars();
        let word_timings = extract_word_timings(
            &chars,
            &speech.alignment.start_times,
            &speech.alignment.end_times,
        );
        if word_timings.is_empty() {
            return Err(GenerationError::EmptyGeneration { stage });
        }
        let segments = index_segments(&word_timings);
        log::info!(
            "pipeline: {stage} done ({} words, {} audio bytes, {}ms)",
            segments.len(),
            speech.audio.len(),
            started.elapsed().as_millis()
        );

        // ── 3. Analysis ──────────────────────────────────────────────────
        let stage = Stage::Analysis;
        let started = enter(stage, cancel)?;

        let analysis_request = self.prompts.analysis_request(&segments, vocabulary);
        let (system, user) = self.prompts.analysis_chat(&analysis_request);
        let response = with_backoff(&self.retry, cancel, stage.label(), || {
            self.text.generate_json(&user, &system)
        })
        .await
        .map_err(|e| GenerationError::from_retry(stage, e))?;

        let raw = response.content;
        let payload = parse_analysis(&raw)?;
        let alignment = match reconcile(word_timings, payload, self.completeness) {
            Ok(alignment) => alignment,
            Err(problems) => return Err(GenerationError::Incomplete { problems, raw }),
        };
        log::info!(
            "pipeline: {stage} done ({} source words, {} target tokens, {}ms)",
            alignment.len(),
            alignment.target_tokens().len(),
            started.elapsed().as_millis()
        );

        Ok(GeneratedPassage {
            passage_text,
            audio: speech.audio,
            alignment,
            generation_prompt,
            analysis_request,
            raw_analysis_response: raw,
        })
    }
}

/// Check cancellation at a stage boundary and start its timer.
fn enter(stage: Stage, cancel: &CancellationToken) -> Result<Instant, GenerationError> {
    if cancel.is_cancelled() {
        log::info!("pipeline: cancelled before {stage} stage");
        return Err(GenerationError::Cancelled { stage });
    }
    log::info!("pipeline: {stage} stage started");
    Ok(Instant::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::VocabularyId;
    use crate::llm::{vocabulary_from_words, MockTextProvider};
    use crate::speech::{MockSynthesizer, SpeechOutput};
    use crate::timing::CharacterAlignment;

    const PASSAGE: &str = "Che boludo";

    const ANALYSIS: &str = r#"{
        "indexed_spanish_words": {
            "0": {"text": "Che", "vocabulary_id": null},
            "1": {"text": "boludo", "vocabulary_id": 0}
        },
        "indexed_english_translation_words": ["Hey", "dude"],
        "alignment_spanish_to_english": {"0": [0], "1": [1]}
    }"#;

    /// Only index 0 is covered.
    const GAPPY_ANALYSIS: &str = r#"{
        "indexed_spanish_words": {"0": {"text": "Che", "vocabulary_id": null}},
        "indexed_english_translation_words": ["Hey", "dude"],
        "alignment_spanish_to_english": {"0": [0]}
    }"#;

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            multiplier: 2.0,
        }
    }

    fn config(completeness: CompletenessPolicy) -> GenerationConfig {
        GenerationConfig {
            completeness,
            retry: fast_retry(3),
        }
    }

    struct Harness {
        text: Arc<MockTextProvider>,
        speech: Arc<MockSynthesizer>,
        generator: AlignmentGenerator,
    }

    fn harness(
        text: MockTextProvider,
        speech: MockSynthesizer,
        config: GenerationConfig,
    ) -> Harness {
        let text = Arc::new(text);
        let speech = Arc::new(speech);
        let generator = AlignmentGenerator::new(text.clone(), speech.clone(), &config);
        Harness {
            text,
            speech,
            generator,
        }
    }

    fn default_harness() -> Harness {
        harness(
            MockTextProvider::new(PASSAGE, ANALYSIS),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        )
    }

    fn vocabulary() -> Vec<VocabularyItem> {
        vocabulary_from_words(&["boludo"])
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn generates_complete_alignment() {
        let h = default_harness();
        let out = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.passage_text, PASSAGE);
        assert!(!out.audio.is_empty());
        assert_eq!(out.alignment.len(), 2);
        assert_eq!(out.alignment.word_timings()[1].word, "boludo");
        assert_eq!(
            out.alignment.source_word(1).unwrap().vocabulary_id,
            Some(VocabularyId::Number(0))
        );
        assert_eq!(out.alignment.targets_for(0), Some(&[0usize][..]));
        assert_eq!(out.raw_analysis_response, ANALYSIS);
        assert_eq!(out.analysis_request["indexed_word_segments"][1]["word"], "boludo");
        assert!(out.generation_prompt.contains("USER INPUT: "));

        assert_eq!(h.text.text_calls(), 1);
        assert_eq!(h.speech.calls(), 1);
        assert_eq!(h.text.json_calls(), 1);
    }

    #[tokio::test]
    async fn fenced_analysis_is_accepted() {
        let h = harness(
            MockTextProvider::new(PASSAGE, format!("Here you go:\n```json\n{ANALYSIS}\n```")),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let out = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.alignment.target_tokens(), &["Hey".to_string(), "dude".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Empty stages
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn blank_passage_fails_before_speech() {
        let h = harness(
            MockTextProvider::new("   \n", ANALYSIS),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::EmptyGeneration { stage: Stage::Passage }));
        assert_eq!(h.speech.calls(), 0);
    }

    #[tokio::test]
    async fn empty_timings_fail_at_speech() {
        let no_timings = SpeechOutput {
            audio: vec![1, 2, 3],
            alignment: CharacterAlignment::default(),
        };
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS),
            MockSynthesizer::speaking(PASSAGE).then(Ok(no_timings)),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::EmptyGeneration { stage: Stage::Speech }));
        assert_eq!(h.text.json_calls(), 0);
    }

    #[tokio::test]
    async fn empty_audio_fails_at_speech() {
        let no_audio = SpeechOutput {
            audio: Vec::new(),
            alignment: CharacterAlignment::from_text("hi", vec![0.0, 0.1], vec![0.1, 0.2]),
        };
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS),
            MockSynthesizer::speaking(PASSAGE).then(Ok(no_audio)),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Speech);
    }

    #[tokio::test]
    async fn empty_provider_response_is_empty_generation() {
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS).then_text(Err(LlmError::EmptyResponse)),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::EmptyGeneration { stage: Stage::Passage }));
        assert_eq!(h.text.text_calls(), 1);
        assert_eq!(h.speech.calls(), 0);
    }

    #[tokio::test]
    async fn empty_audio_error_is_empty_generation() {
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS),
            MockSynthesizer::speaking(PASSAGE).then(Err(SpeechError::EmptyAudio)),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::EmptyGeneration { stage: Stage::Speech }));
        assert_eq!(h.text.json_calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Analysis failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unparseable_analysis_keeps_raw() {
        let h = harness(
            MockTextProvider::new(PASSAGE, "Lo siento, no puedo."),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Parse { .. }));
        assert_eq!(err.raw(), Some("Lo siento, no puedo."));
        assert_eq!(err.stage(), Stage::Analysis);
    }

    #[tokio::test]
    async fn schema_failure_names_fields() {
        let h = harness(
            MockTextProvider::new(PASSAGE, r#"{"indexed_spanish_words": {}}"#),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        let GenerationError::Schema { fields, .. } = err else {
            panic!("expected schema error, got {err:?}");
        };
        assert_eq!(fields.len(), 2);
    }

    #[tokio::test]
    async fn strict_policy_rejects_gaps() {
        let h = harness(
            MockTextProvider::new(PASSAGE, GAPPY_ANALYSIS),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        let GenerationError::Incomplete { problems, raw } = err else {
            panic!("expected incomplete error, got {err:?}");
        };
        assert!(problems.contains(&AlignmentIssue::MissingSourceWord(1)));
        assert!(problems.contains(&AlignmentIssue::MissingAlignment(1)));
        assert_eq!(raw, GAPPY_ANALYSIS);
    }

    #[tokio::test]
    async fn repair_policy_fills_gaps() {
        let h = harness(
            MockTextProvider::new(PASSAGE, GAPPY_ANALYSIS),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Repair),
        );
        let out = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.alignment.len(), 2);
        assert_eq!(out.alignment.source_word(1).unwrap().text, "boludo");
        assert_eq!(out.alignment.targets_for(1), Some(&[][..]));
    }

    // -----------------------------------------------------------------------
    // Retry
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS).then_text(Err(LlmError::Timeout)),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let out = h.generator.generate(&vocabulary(), &CancellationToken::new()).await;

        assert!(out.is_ok());
        assert_eq!(h.text.text_calls(), 2);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let unavailable = || {
            Err(SpeechError::Http {
                status: 503,
                body: "busy".into(),
            })
        };
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS),
            MockSynthesizer::speaking(PASSAGE)
                .then(unavailable())
                .then(unavailable())
                .then(unavailable()),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Capability { stage: Stage::Speech, attempts: 3, .. }
        ));
        assert_eq!(h.speech.calls(), 3);
        assert_eq!(h.text.json_calls(), 0);
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS).then_json(Err(LlmError::Http {
                status: 401,
                body: "bad key".into(),
            })),
            MockSynthesizer::speaking(PASSAGE),
            config(CompletenessPolicy::Strict),
        );
        let err = h
            .generator
            .generate(&vocabulary(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Capability { stage: Stage::Analysis, attempts: 1, .. }
        ));
        assert_eq!(h.text.json_calls(), 1);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancelled_token_stops_before_first_call() {
        let h = default_harness();
        let token = CancellationToken::new();
        token.cancel();

        let err = h.generator.generate(&vocabulary(), &token).await.unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled { stage: Stage::Passage }));
        assert_eq!(h.text.text_calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let slow_retry = GenerationConfig {
            completeness: CompletenessPolicy::Strict,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 60_000,
                max_backoff_ms: 60_000,
                multiplier: 1.0,
            },
        };
        let h = harness(
            MockTextProvider::new(PASSAGE, ANALYSIS).then_text(Err(LlmError::Timeout)),
            MockSynthesizer::speaking(PASSAGE),
            slow_retry,
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = h.generator.generate(&vocabulary(), &token).await.unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled { stage: Stage::Passage }));
        assert_eq!(h.text.text_calls(), 1);
        assert_eq!(h.speech.calls(), 0);
    }
}
