//! The stages of passage generation.
//!
//! ```text
//! Passage ──text──▶ Speech ──word timings──▶ Analysis ──▶ BilingualAlignment
//! ```
//!
//! Stages run strictly in order; a failure in any of them aborts the run
//! and nothing is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// The text provider writes the passage.
    Passage,
    /// The synthesizer speaks it; character timings become word timings.
    Speech,
    /// The text provider aligns the words with a tokenized translation.
    Analysis,
}

impl Stage {
    /// A short human-readable label for logs and CLI output.
    ///
    /// ```
    /// use aligned_reader::pipeline::Stage;
    ///
    /// assert_eq!(Stage::Passage.label(), "passage");
    /// assert_eq!(Stage::Analysis.to_string(), "analysis");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Passage => "passage",
            Stage::Speech => "speech",
            Stage::Analysis => "analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
