//! `ElevenLabsSynthesizer`: text-to-speech with character timestamps.
//!
//! `POST {base}/v1/text-to-speech/{voice_id}/with-timestamps?output_format=…`
//! returns JSON with base64 audio and an `alignment` object:
//!
//! ```json
//! {
//!   "audio_base64": "SUQzBAAAAAAA…",
//!   "alignment": {
//!     "characters": ["H", "o", "l", "a"],
//!     "character_start_times_seconds": [0.0, 0.07, 0.12, 0.2],
//!     "character_end_times_seconds":   [0.07, 0.12, 0.2, 0.31]
//!   },
//!   "normalized_alignment": { … }
//! }
//! ```

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use serde_json::json;

use crate::config::SpeechConfig;
use crate::llm::provider::http_client;
use crate::speech::synthesizer::{SpeechError, SpeechOutput, SpeechSynthesizer};
use crate::timing::CharacterAlignment;

#[derive(Debug, Deserialize)]
struct TimestampsResponse {
    audio_base64: String,
    #[serde(default)]
    alignment: Option<CharacterAlignment>,
    #[serde(default)]
    normalized_alignment: Option<CharacterAlignment>,
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    config: SpeechConfig,
    api_key: String,
}

impl ElevenLabsSynthesizer {
    /// Build from config.  Both the API key and a voice id are required.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SpeechError::NotConfigured("ELEVENLABS_API_KEY is not set".into()))?
            .to_string();
        if config.voice_id.trim().is_empty() {
            return Err(SpeechError::NotConfigured("ELEVENLABS_VOICE_ID is not set".into()));
        }

        Ok(Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/with-timestamps",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        )
    }
}

/// Decode the audio and pick the alignment (raw first, normalized second).
fn decode_response(response: TimestampsResponse) -> Result<SpeechOutput, SpeechError> {
    let audio = general_purpose::STANDARD
        .decode(response.audio_base64.trim())
        .map_err(|e| SpeechError::Decode(format!("audio_base64: {e}")))?;
    if audio.is_empty() {
        return Err(SpeechError::EmptyAudio);
    }

    let alignment = match (response.alignment, response.normalized_alignment) {
        (Some(a), _) if !a.is_empty() => a,
        (_, Some(n)) => {
            log::warn!("speech: no character alignment, using normalized alignment");
            n
        }
        (a, None) => a.unwrap_or_default(),
    };

    Ok(SpeechOutput { audio, alignment })
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize_with_timings(&self, text: &str) -> Result<SpeechOutput, SpeechError> {
        let body = json!({
            "text": text,
            "model_id": self.config.model_id,
        });

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TimestampsResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Decode(e.to_string()))?;
        let output = decode_response(parsed)?;

        log::info!(
            "speech: synthesized {} chars into {} bytes in {}ms",
            text.chars().count(),
            output.audio.len(),
            started.elapsed().as_millis()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SpeechConfig {
        SpeechConfig {
            api_key: Some("el-test".into()),
            voice_id: "voice123".into(),
            ..SpeechConfig::default()
        }
    }

    fn response(json: serde_json::Value) -> TimestampsResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn requires_key_and_voice() {
        assert!(ElevenLabsSynthesizer::from_config(&config()).is_ok());

        let mut no_key = config();
        no_key.api_key = None;
        assert!(matches!(
            ElevenLabsSynthesizer::from_config(&no_key),
            Err(SpeechError::NotConfigured(_))
        ));

        let mut no_voice = config();
        no_voice.voice_id = " ".into();
        assert!(matches!(
            ElevenLabsSynthesizer::from_config(&no_voice),
            Err(SpeechError::NotConfigured(_))
        ));
    }

    #[test]
    fn endpoint_includes_voice() {
        let synth = ElevenLabsSynthesizer::from_config(&config()).unwrap();
        assert_eq!(
            synth.endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/voice123/with-timestamps"
        );
    }

    #[test]
    fn decodes_audio_and_alignment() {
        let output = decode_response(response(json!({
            "audio_base64": "AAEC",
            "alignment": {
                "characters": ["h", "i"],
                "character_start_times_seconds": [0.0, 0.1],
                "character_end_times_seconds": [0.1, 0.2]
            }
        })))
        .unwrap();

        assert_eq!(output.audio, vec![0, 1, 2]);
        assert_eq!(output.alignment.chars(), vec!['h', 'i']);
    }

    #[test]
    fn falls_back_to_normalized_alignment() {
        let output = decode_response(response(json!({
            "audio_base64": "AAEC",
            "alignment": null,
            "normalized_alignment": {
                "characters": ["o", "k"],
                "character_start_times_seconds": [0.0, 0.1],
                "character_end_times_seconds": [0.1, 0.2]
            }
        })))
        .unwrap();
        assert_eq!(output.alignment.chars(), vec!['o', 'k']);
    }

    #[test]
    fn bad_or_empty_audio() {
        let bad = decode_response(response(json!({"audio_base64": "***"})));
        assert!(matches!(bad, Err(SpeechError::Decode(_))));

        let empty = decode_response(response(json!({"audio_base64": ""})));
        assert!(matches!(empty, Err(SpeechError::EmptyAudio)));
    }
}
