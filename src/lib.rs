//! Vocabulary-driven reading passages with word-synchronised audio.
//!
//! A passage is generated around a learner's vocabulary, spoken by a TTS
//! service, translated token by token, and aligned so a player can
//! highlight the current spoken word together with its translation.

pub mod analysis;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod playback;
pub mod speech;
pub mod storage;
pub mod timing;
