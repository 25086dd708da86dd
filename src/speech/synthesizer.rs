//! Core speech synthesis trait, its output and error types.
//!
//! [`SpeechSynthesizer`] is the interface used by the pipeline.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn SpeechSynthesizer>`.
//!
//! [`MockSynthesizer`] (available under `#[cfg(test)]`) replays scripted
//! responses and counts calls, for testing the pipeline without a network.

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::retry::Transient;
use crate::llm::provider::is_transient_status;
use crate::timing::CharacterAlignment;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// All errors that can arise from the speech subsystem.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech request timed out")]
    Timeout,

    #[error("speech provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body or its base64 audio could not be decoded.
    #[error("failed to decode speech response: {0}")]
    Decode(String),

    #[error("speech provider returned no audio")]
    EmptyAudio,

    #[error("speech provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

impl Transient for SpeechError {
    fn is_transient(&self) -> bool {
        match self {
            SpeechError::Request(_) | SpeechError::Timeout => true,
            SpeechError::Http { status, .. } => is_transient_status(*status),
            SpeechError::Decode(_) | SpeechError::EmptyAudio | SpeechError::NotConfigured(_) => {
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechOutput
// ---------------------------------------------------------------------------

/// Encoded audio plus the character timings of the spoken text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOutput {
    /// Encoded audio (MP3 for the default output format).
    pub audio: Vec<u8>,
    pub alignment: CharacterAlignment,
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for text-to-speech with timings.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, returning audio and per-character timings.
    async fn synthesize_with_timings(&self, text: &str) -> Result<SpeechOutput, SpeechError>;
}

// ---------------------------------------------------------------------------
// MockSynthesizer  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays scripted responses in order; once the script
/// runs out it keeps answering with the default output.
#[cfg(test)]
pub struct MockSynthesizer {
    script: std::sync::Mutex<std::collections::VecDeque<Result<SpeechOutput, SpeechError>>>,
    default: SpeechOutput,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockSynthesizer {
    /// Speaks `text` with 0.1 s per character.
    pub fn speaking(text: &str) -> Self {
        let n = text.chars().count();
        let start: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
        let end: Vec<f64> = (0..n).map(|i| (i + 1) as f64 * 0.1).collect();
        Self {
            script: Default::default(),
            default: SpeechOutput {
                audio: vec![0xFF, 0xFB, 0x90, 0x00],
                alignment: CharacterAlignment::from_text(text, start, end),
            },
            calls: Default::default(),
        }
    }

    /// Queue `response` ahead of the default.
    pub fn then(self, response: Result<SpeechOutput, SpeechError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize_with_timings(&self, _text: &str) -> Result<SpeechOutput, SpeechError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(self.default.clone()))
    }
}
