//! Character-timing → word-timing extraction.

use std::ops::Range;

use crate::timing::types::{IndexedWordSegment, WordTiming};

/// Confidence assigned to every extracted word.
///
/// The speech provider reports no per-character confidence, so there is
/// nothing to aggregate yet.
pub const DEFAULT_WORD_CONFIDENCE: f32 = 1.0;

// ---------------------------------------------------------------------------
// ConfidenceAggregator
// ---------------------------------------------------------------------------

/// Computes a word's confidence from the characters it was built from.
///
/// `span` is the half-open range of character positions (into the input
/// arrays) that make up the word.  Implementations must return a value in
/// `0.0..=1.0`.
pub trait ConfidenceAggregator {
    fn word_confidence(&self, span: Range<usize>) -> f32;
}

/// Assigns the same confidence to every word.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f32);

impl Default for FixedConfidence {
    fn default() -> Self {
        Self(DEFAULT_WORD_CONFIDENCE)
    }
}

impl ConfidenceAggregator for FixedConfidence {
    fn word_confidence(&self, _span: Range<usize>) -> f32 {
        self.0.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Fold character timings into word timings with the default confidence.
///
/// Returns an empty vector when the three inputs differ in length or are
/// empty.  Callers that expected speech must treat that as a failure.
pub fn extract_word_timings(
    characters: &[char],
    start_times: &[f64],
    end_times: &[f64],
) -> Vec<WordTiming> {
    extract_word_timings_with(characters, start_times, end_times, &FixedConfidence::default())
}

/// Same as [`extract_word_timings`] with a caller-supplied confidence source.
pub fn extract_word_timings_with(
    characters: &[char],
    start_times: &[f64],
    end_times: &[f64],
    confidence: &dyn ConfidenceAggregator,
) -> Vec<WordTiming> {
    if characters.is_empty() {
        log::warn!("timing: no character timings to extract from");
        return Vec::new();
    }
    if characters.len() != start_times.len() || characters.len() != end_times.len() {
        log::warn!(
            "timing: length mismatch (chars={}, starts={}, ends={})",
            characters.len(),
            start_times.len(),
            end_times.len()
        );
        return Vec::new();
    }

    let mut words = Vec::new();
    let mut buffer = WordBuffer::default();

    for (i, &ch) in characters.iter().enumerate() {
        if ch.is_whitespace() {
            buffer.flush_into(&mut words, confidence);
        } else {
            buffer.absorb(i, ch, start_times[i], end_times[i]);
        }
    }
    buffer.flush_into(&mut words, confidence);

    log::debug!(
        "timing: extracted {} words from {} characters",
        words.len(),
        characters.len()
    );
    words
}

/// Attach positional indices to a timing sequence.
pub fn index_segments(timings: &[WordTiming]) -> Vec<IndexedWordSegment> {
    timings
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, timing)| IndexedWordSegment { index, timing })
        .collect()
}

// ---------------------------------------------------------------------------
// WordBuffer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WordBuffer {
    text: String,
    first_char: usize,
    last_char: usize,
    start: f64,
    end: f64,
}

impl WordBuffer {
    fn absorb(&mut self, position: usize, ch: char, start: f64, end: f64) {
        if self.text.is_empty() {
            self.first_char = position;
            self.start = start;
        }
        self.text.push(ch);
        self.last_char = position;
        self.end = end;
    }

    fn flush_into(&mut self, words: &mut Vec<WordTiming>, confidence: &dyn ConfidenceAggregator) {
        if self.text.is_empty() {
            return;
        }
        // Guard against providers reporting an end before the start.
        let end = self.end.max(self.start);
        words.push(WordTiming {
            word: std::mem::take(&mut self.text),
            start: self.start,
            end,
            confidence: confidence.word_confidence(self.first_char..self.last_char + 1),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
