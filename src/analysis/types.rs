//! The bilingual alignment data model.
//!
//! [`BilingualAlignment`] is immutable once built: its fields are private and
//! the only ways to obtain one are [`BilingualAlignment::new`] and
//! deserialization, both of which enforce the completeness and bounds
//! invariants.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::llm::vocabulary::{VocabularyId, VocabularyItem};
use crate::timing::WordTiming;

// ---------------------------------------------------------------------------
// IndexedSpanishWordDetail
// ---------------------------------------------------------------------------

/// Per-index detail for a source-language word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSpanishWordDetail {
    /// The source word, echoing the timing segment at the same index.
    pub text: String,
    /// The vocabulary entry this word belongs to, if any.
    #[serde(default)]
    pub vocabulary_id: Option<VocabularyId>,
}

// ---------------------------------------------------------------------------
// AnalysisPayload
// ---------------------------------------------------------------------------

/// The three required fields of a validated analysis response.
///
/// Only presence and shape have been checked; completeness against the word
/// timings is decided later by [`reconcile`](crate::analysis::reconcile).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisPayload {
    pub indexed_source_words: BTreeMap<usize, IndexedSpanishWordDetail>,
    pub target_tokens: Vec<String>,
    pub alignment_source_to_target: BTreeMap<usize, Vec<usize>>,
}

// ---------------------------------------------------------------------------
// AlignmentIssue
// ---------------------------------------------------------------------------

/// A single violation of the alignment invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentIssue {
    MissingSourceWord(usize),
    UnexpectedSourceWord(usize),
    MissingAlignment(usize),
    UnexpectedAlignment(usize),
    TargetOutOfRange { source: usize, target: usize },
    /// `start` or `end` is NaN.
    TimingNotANumber { index: usize },
    /// `end` precedes `start`.
    TimingInverted { index: usize },
    /// `start` precedes the previous word's `start`.
    TimingOutOfOrder { index: usize },
}

impl fmt::Display for AlignmentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentIssue::MissingSourceWord(i) => {
                write!(f, "no source word detail for index {i}")
            }
            AlignmentIssue::UnexpectedSourceWord(i) => {
                write!(f, "source word detail for unknown index {i}")
            }
            AlignmentIssue::MissingAlignment(i) => write!(f, "no alignment entry for index {i}"),
            AlignmentIssue::UnexpectedAlignment(i) => {
                write!(f, "alignment entry for unknown index {i}")
            }
            AlignmentIssue::TargetOutOfRange { source, target } => {
                write!(f, "index {source} aligns to target token {target}, which does not exist")
            }
            AlignmentIssue::TimingNotANumber { index } => {
                write!(f, "word timing {index} has a NaN start or end")
            }
            AlignmentIssue::TimingInverted { index } => {
                write!(f, "word timing {index} ends before it starts")
            }
            AlignmentIssue::TimingOutOfOrder { index } => {
                write!(f, "word timing {index} starts before the previous word")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BilingualAlignment
// ---------------------------------------------------------------------------

/// Word timings, per-word details, the tokenized translation and the
/// source→target index alignment for one passage.
///
/// Invariants (N = number of word timings, M = number of target tokens):
/// * `indexed_source_words` has exactly the keys `0..N`.
/// * `alignment_source_to_target` has exactly the keys `0..N`.
/// * every aligned target index is `< M`.
/// * every timing has `start <= end`, and starts are non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AlignmentParts", into = "AlignmentParts")]
pub struct BilingualAlignment {
    word_timings: Vec<WordTiming>,
    indexed_source_words: BTreeMap<usize, IndexedSpanishWordDetail>,
    target_tokens: Vec<String>,
    alignment_source_to_target: BTreeMap<usize, Vec<usize>>,
}

impl BilingualAlignment {
    /// Assemble an alignment, rejecting any invariant violation.
    pub fn new(
        word_timings: Vec<WordTiming>,
        indexed_source_words: BTreeMap<usize, IndexedSpanishWordDetail>,
        target_tokens: Vec<String>,
        alignment_source_to_target: BTreeMap<usize, Vec<usize>>,
    ) -> Result<Self, Vec<AlignmentIssue>> {
        let issues = find_issues(
            &word_timings,
            &indexed_source_words,
            target_tokens.len(),
            &alignment_source_to_target,
        );
        if !issues.is_empty() {
            return Err(issues);
        }
        Ok(Self {
            word_timings,
            indexed_source_words,
            target_tokens,
            alignment_source_to_target,
        })
    }

    /// An alignment for a passage with no words.
    pub fn empty() -> Self {
        Self {
            word_timings: Vec::new(),
            indexed_source_words: BTreeMap::new(),
            target_tokens: Vec::new(),
            alignment_source_to_target: BTreeMap::new(),
        }
    }

    pub fn word_timings(&self) -> &[WordTiming] {
        &self.word_timings
    }

    pub fn indexed_source_words(&self) -> &BTreeMap<usize, IndexedSpanishWordDetail> {
        &self.indexed_source_words
    }

    pub fn target_tokens(&self) -> &[String] {
        &self.target_tokens
    }

    pub fn alignment_source_to_target(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.alignment_source_to_target
    }

    /// Number of source words (N).
    pub fn len(&self) -> usize {
        self.word_timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_timings.is_empty()
    }

    pub fn source_word(&self, index: usize) -> Option<&IndexedSpanishWordDetail> {
        self.indexed_source_words.get(&index)
    }

    /// Target token indices aligned to `index`, or `None` for an unknown index.
    pub fn targets_for(&self, index: usize) -> Option<&[usize]> {
        self.alignment_source_to_target
            .get(&index)
            .map(Vec::as_slice)
    }

    pub fn target_token(&self, index: usize) -> Option<&str> {
        self.target_tokens.get(index).map(String::as_str)
    }

    /// The passage text reconstructed from the word timings.
    pub fn source_text(&self) -> String {
        self.word_timings
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Check every invariant, returning all violations found.
pub(crate) fn find_issues(
    word_timings: &[WordTiming],
    source_words: &BTreeMap<usize, IndexedSpanishWordDetail>,
    token_count: usize,
    alignment: &BTreeMap<usize, Vec<usize>>,
) -> Vec<AlignmentIssue> {
    let word_count = word_timings.len();
    let mut issues = timing_issues(word_timings);

    for index in 0..word_count {
        if !source_words.contains_key(&index) {
            issues.push(AlignmentIssue::MissingSourceWord(index));
        }
        if !alignment.contains_key(&index) {
            issues.push(AlignmentIssue::MissingAlignment(index));
        }
    }
    issues.extend(
        source_words
            .keys()
            .filter(|&&k| k >= word_count)
            .map(|&k| AlignmentIssue::UnexpectedSourceWord(k)),
    );
    for (&source, targets) in alignment {
        if source >= word_count {
            issues.push(AlignmentIssue::UnexpectedAlignment(source));
            continue;
        }
        issues.extend(
            targets
                .iter()
                .filter(|&&t| t >= token_count)
                .map(|&target| AlignmentIssue::TargetOutOfRange { source, target }),
        );
    }

    issues
}

/// Ordering problems in `word_timings`.  A NaN timing is reported once and
/// skipped for the ordering checks.
fn timing_issues(word_timings: &[WordTiming]) -> Vec<AlignmentIssue> {
    let mut issues = Vec::new();
    let mut previous_start: Option<f64> = None;

    for (index, w) in word_timings.iter().enumerate() {
        if w.start.is_nan() || w.end.is_nan() {
            issues.push(AlignmentIssue::TimingNotANumber { index });
            continue;
        }
        if w.end < w.start {
            issues.push(AlignmentIssue::TimingInverted { index });
        }
        if previous_start.is_some_and(|prev| w.start < prev) {
            issues.push(AlignmentIssue::TimingOutOfOrder { index });
        }
        previous_start = Some(w.start);
    }

    issues
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Serialized shape of [`BilingualAlignment`].  Map keys are written as
/// string-encoded integers.
#[derive(Serialize, Deserialize)]
struct AlignmentParts {
    word_timings: Vec<WordTiming>,
    #[serde(rename = "indexed_spanish_words")]
    indexed_source_words: BTreeMap<usize, IndexedSpanishWordDetail>,
    #[serde(rename = "indexed_english_translation_words")]
    target_tokens: Vec<String>,
    #[serde(rename = "alignment_spanish_to_english")]
    alignment_source_to_target: BTreeMap<usize, Vec<usize>>,
}

impl TryFrom<AlignmentParts> for BilingualAlignment {
    type Error = String;

    fn try_from(parts: AlignmentParts) -> Result<Self, Self::Error> {
        BilingualAlignment::new(
            parts.word_timings,
            parts.indexed_source_words,
            parts.target_tokens,
            parts.alignment_source_to_target,
        )
        .map_err(|issues| {
            issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}

impl From<BilingualAlignment> for AlignmentParts {
    fn from(a: BilingualAlignment) -> Self {
        Self {
            word_timings: a.word_timings,
            indexed_source_words: a.indexed_source_words,
            target_tokens: a.target_tokens,
            alignment_source_to_target: a.alignment_source_to_target,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
