//! Speech synthesis with character-level timings.
//!
//! ```text
//! passage text ──▶ SpeechSynthesizer ──▶ SpeechOutput { audio, alignment }
//!                        ▲                                 │
//!              ElevenLabsSynthesizer                       ▼
//!                                               timing::extract_word_timings
//! ```

pub mod elevenlabs;
pub mod synthesizer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use elevenlabs::ElevenLabsSynthesizer;
pub use synthesizer::{SpeechError, SpeechOutput, SpeechSynthesizer};

// test-only re-export so the pipeline tests can script the synthesizer.
#[cfg(test)]
pub use synthesizer::MockSynthesizer;
