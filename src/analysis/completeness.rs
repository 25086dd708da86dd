//! Completeness policy: turning a validated payload into an alignment.
//!
//! The analysis model is instructed to cover every word index, but nothing
//! guarantees it does.  [`CompletenessPolicy`] makes the choice explicit:
//!
//! | Policy   | Gaps / stray keys / out-of-range targets           |
//! |----------|----------------------------------------------------|
//! | `Strict` | rejected, every issue reported                     |
//! | `Repair` | filled or dropped, each repair logged at `warn`    |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::types::{
    AlignmentIssue, AnalysisPayload, BilingualAlignment, IndexedSpanishWordDetail,
};
use crate::timing::WordTiming;

// ---------------------------------------------------------------------------
// CompletenessPolicy
// ---------------------------------------------------------------------------

/// How to treat an analysis that does not cover exactly the word indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletenessPolicy {
    /// Fail on any missing or unexpected index, or out-of-range target.
    Strict,
    /// Fill missing entries from the word timings (no vocabulary match, no
    /// aligned targets), drop unknown keys and out-of-range targets.
    Repair,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        Self::Strict
    }
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Combine word timings and an analysis payload under `policy`.
pub fn reconcile(
    word_timings: Vec<WordTiming>,
    payload: AnalysisPayload,
    policy: CompletenessPolicy,
) -> Result<BilingualAlignment, Vec<AlignmentIssue>> {
    match policy {
        CompletenessPolicy::Strict => BilingualAlignment::new(
            word_timings,
            payload.indexed_source_words,
            payload.target_tokens,
            payload.alignment_source_to_target,
        ),
        CompletenessPolicy::Repair => {
            let (details, alignment) = repair(
                &word_timings,
                payload.indexed_source_words,
                payload.target_tokens.len(),
                payload.alignment_source_to_target,
            );
            BilingualAlignment::new(word_timings, details, payload.target_tokens, alignment)
        }
    }
}

fn repair(
    word_timings: &[WordTiming],
    mut source_words: BTreeMap<usize, IndexedSpanishWordDetail>,
    token_count: usize,
    mut alignment: BTreeMap<usize, Vec<usize>>,
) -> (
    BTreeMap<usize, IndexedSpanishWordDetail>,
    BTreeMap<usize, Vec<usize>>,
) {
    let word_count = word_timings.len();

    for stray in source_words.keys().filter(|&&k| k >= word_count) {
        log::warn!("analysis: dropping source word detail for unknown index {stray}");
    }
    source_words.retain(|&k, _| k < word_count);

    for stray in alignment.keys().filter(|&&k| k >= word_count) {
        log::warn!("analysis: dropping alignment entry for unknown index {stray}");
    }
    alignment.retain(|&k, _| k < word_count);

    for (index, timing) in word_timings.iter().enumerate() {
        source_words.entry(index).or_insert_with(|| {
            log::warn!("analysis: filling missing source word detail for index {index}");
            IndexedSpanishWordDetail {
                text: timing.word.clone(),
                vocabulary_id: None,
            }
        });

        let targets = alignment.entry(index).or_insert_with(|| {
            log::warn!("analysis: filling missing alignment entry for index {index}");
            Vec::new()
        });

        let before = targets.len();
        let mut seen = Vec::with_capacity(before);
        targets.retain(|&t| {
            let keep = t < token_count && !seen.contains(&t);
            seen.push(t);
            keep
        });
        if targets.len() != before {
            log::warn!(
                "analysis: dropped {} invalid target indices for index {index}",
                before - targets.len()
            );
        }
    }

    (source_words, alignment)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
