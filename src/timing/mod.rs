//! Word-level timing extraction for synthesized speech.
//!
//! The speech provider returns one timestamp pair per *character*.  This
//! module folds those into [`WordTiming`]s (one per whitespace-delimited
//! word) and assigns every word its positional index, the join key used by
//! the analysis and playback modules.
//!
//! ```text
//! characters   h    i    ␠    t    h    e    r    e
//! start (s)   0.0  0.1  0.2  0.3  0.4  0.5  0.6  0.7
//!              └────┘         └───────────────────┘
//!              "hi"                  "there"
//! ```

pub mod extract;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use extract::{
    extract_word_timings, extract_word_timings_with, index_segments, ConfidenceAggregator,
    FixedConfidence, DEFAULT_WORD_CONFIDENCE,
};
pub use types::{CharacterAlignment, IndexedWordSegment, WordTiming};
