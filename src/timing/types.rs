//! Timing data types shared by the extractor, the analysis prompt and the
//! playback synchronizer.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WordTiming
// ---------------------------------------------------------------------------

/// A spoken word located in the audio track.
///
/// `start <= end` always holds for values produced by the extractor, and a
/// sequence of them is ordered by non-decreasing `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    /// Seconds from the start of the audio.
    pub start: f64,
    /// Seconds from the start of the audio.
    pub end: f64,
    /// Always in `0.0..=1.0`.
    pub confidence: f32,
}

impl WordTiming {
    /// Length of the word in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

// ---------------------------------------------------------------------------
// IndexedWordSegment
// ---------------------------------------------------------------------------

/// A [`WordTiming`] tagged with its 0-based position in the timing sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedWordSegment {
    pub index: usize,
    #[serde(flatten)]
    pub timing: WordTiming,
}

impl IndexedWordSegment {
    pub fn word(&self) -> &str {
        &self.timing.word
    }
}

// ---------------------------------------------------------------------------
// CharacterAlignment
// ---------------------------------------------------------------------------

/// Character-level timing as returned by the speech provider.
///
/// The field names match the provider's `alignment` object so the struct can
/// be deserialized straight from the response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterAlignment {
    /// One entry per character.  Providers send single-character strings;
    /// anything longer is treated as its first character.
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default, rename = "character_start_times_seconds")]
    pub start_times: Vec<f64>,
    #[serde(default, rename = "character_end_times_seconds")]
    pub end_times: Vec<f64>,
}

impl CharacterAlignment {
    /// Build an alignment from a plain string and per-character times.
    pub fn from_text(text: &str, start_times: Vec<f64>, end_times: Vec<f64>) -> Self {
        Self {
            characters: text.chars().map(String::from).collect(),
            start_times,
            end_times,
        }
    }

    /// The characters as `char`s.  Empty strings map to a space so they act
    /// as word separators rather than silently joining two words.
    pub fn chars(&self) -> Vec<char> {
        self.characters
            .iter()
            .map(|c| c.chars().next().unwrap_or(' '))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
