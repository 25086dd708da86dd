//! Bilingual analysis: the alignment data model, the parser/validator for
//! model output, and the completeness policy that turns a parsed payload
//! into a [`BilingualAlignment`].
//!
//! ```text
//! raw model text ──parse_analysis──▶ AnalysisPayload
//!                                         │
//!               word timings ─────────────┤
//!                                         ▼
//!                              reconcile(policy) ──▶ BilingualAlignment
//! ```

pub mod completeness;
pub mod parser;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use completeness::{reconcile, CompletenessPolicy};
pub use parser::{
    extract_json, parse_analysis, AnalysisError, ALIGNMENT_FIELD, SOURCE_WORDS_FIELD,
    TARGET_TOKENS_FIELD,
};
pub use types::{
    AlignmentIssue, AnalysisPayload, BilingualAlignment, IndexedSpanishWordDetail, VocabularyId,
    VocabularyItem,
};
