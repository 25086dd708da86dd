//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Secrets are usually not written to `settings.toml`; they are picked up
//! from the environment by [`AppConfig::apply_env_overrides`].

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::analysis::CompletenessPolicy;
use crate::llm::RetryPolicy;

// ---------------------------------------------------------------------------
// LlmProvider
// ---------------------------------------------------------------------------

/// Selects which text-completion backend generates passages and analyses.
///
/// The choice is made once at startup; see [`crate::llm::build_provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// Any OpenAI-compatible chat-completions API (Grok, OpenAI, Groq …).
    OpenAiCompatible,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Anthropic
    }
}

impl LlmProvider {
    /// Parse the `LLM_PROVIDER` environment value.  `grok` and `openai` both
    /// select the OpenAI-compatible client.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "grok" | "openai" | "openai-compatible" => Some(Self::OpenAiCompatible),
            _ => None,
        }
    }

    /// Base URL used when none is configured.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAiCompatible => "https://api.x.ai/v1",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-7-sonnet-20250219",
            Self::OpenAiCompatible => "grok-3",
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the text-completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Anthropic: `https://api.anthropic.com`
    /// - Grok: `https://api.x.ai/v1`
    /// - OpenAI: `https://api.openai.com/v1`
    pub base_url: String,
    /// API key.  Usually supplied via the environment.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature for passage generation.
    pub text_temperature: f32,
    /// Sampling temperature for the JSON analysis call.
    pub json_temperature: f32,
    /// Token limit for passage generation.
    pub text_max_tokens: u32,
    /// Token limit for the analysis call; the JSON is large.
    pub json_max_tokens: u32,
    /// Ask the provider for JSON-only output where it supports it.
    pub structured_output: bool,
    /// Maximum seconds to wait for a single response.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let provider = LlmProvider::default();
        Self {
            provider,
            base_url: provider.default_base_url().into(),
            api_key: None,
            model: provider.default_model().into(),
            text_temperature: 0.7,
            json_temperature: 0.5,
            text_max_tokens: 1_000,
            json_max_tokens: 10_000,
            structured_output: true,
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the speech synthesis provider (ElevenLabs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    /// API key.  Usually supplied via the environment.
    pub api_key: Option<String>,
    /// Voice used for every passage.
    pub voice_id: String,
    pub model_id: String,
    /// Provider output format, e.g. `mp3_44100_128`.
    pub output_format: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            api_key: None,
            voice_id: String::new(),
            model_id: "eleven_multilingual_v2".into(),
            output_format: "mp3_44100_128".into(),
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Where passage records and audio are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `None` means [`AppPaths::passages_dir`].
    pub passages_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured directory, or the platform default.
    pub fn resolved_dir(&self) -> PathBuf {
        self.passages_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().passages_dir)
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

/// Behaviour of the passage → speech → analysis sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// What to do when the analysis does not cover every word index.
    pub completeness: CompletenessPolicy,
    /// Backoff applied to every provider call.
    pub retry: RetryPolicy,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use aligned_reader::config::AppConfig;
///
/// // Load (returns Default when file is missing), then layer env secrets.
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env_overrides();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Layer secrets and deployment settings from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Layer overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).  Empty values are ignored.
    ///
    /// | Variable              | Field                                  |
    /// |-----------------------|----------------------------------------|
    /// | `LLM_PROVIDER`        | `llm.provider` (anthropic/grok/openai) |
    /// | `ANTHROPIC_API_KEY`   | `llm.api_key` (Anthropic)              |
    /// | `GROK_API_KEY`        | `llm.api_key` (OpenAI-compatible)      |
    /// | `OPENAI_API_KEY`      | `llm.api_key` (fallback)               |
    /// | `GROK_MODEL_NAME`     | `llm.model` (OpenAI-compatible)        |
    /// | `GROK_API_BASE_URL`   | `llm.base_url` (OpenAI-compatible)     |
    /// | `ELEVENLABS_API_KEY`  | `speech.api_key`                       |
    /// | `ELEVENLABS_VOICE_ID` | `speech.voice_id`                      |
    /// | `ELEVENLABS_MODEL_ID` | `speech.model_id`                      |
    /// | `LOCAL_AUDIO_PATH`    | `storage.passages_dir`                 |
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = get("LLM_PROVIDER") {
            match LlmProvider::from_name(&name) {
                Some(provider) => self.switch_provider(provider),
                None => log::warn!(
                    "config: unknown LLM_PROVIDER {name:?}, keeping {:?}",
                    self.llm.provider
                ),
            }
        }

        match self.llm.provider {
            LlmProvider::Anthropic => {
                if let Some(key) = get("ANTHROPIC_API_KEY") {
                    self.llm.api_key = Some(key);
                }
            }
            LlmProvider::OpenAiCompatible => {
                if let Some(key) = get("GROK_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
                    self.llm.api_key = Some(key);
                }
                if let Some(model) = get("GROK_MODEL_NAME") {
                    self.llm.model = model;
                }
                if let Some(url) = get("GROK_API_BASE_URL") {
                    self.llm.base_url = url;
                }
            }
        }

        if let Some(key) = get("ELEVENLABS_API_KEY") {
            self.speech.api_key = Some(key);
        }
        if let Some(voice) = get("ELEVENLABS_VOICE_ID") {
            self.speech.voice_id = voice;
        }
        if let Some(model) = get("ELEVENLABS_MODEL_ID") {
            self.speech.model_id = model;
        }
        if let Some(dir) = get("LOCAL_AUDIO_PATH") {
            self.storage.passages_dir = Some(PathBuf::from(dir));
        }
    }

    /// Change provider, replacing the base URL and model only when they are
    /// still the previous provider's defaults.
    fn switch_provider(&mut self, provider: LlmProvider) {
        let previous = self.llm.provider;
        if previous == provider {
            return;
        }
        if self.llm.base_url == previous.default_base_url() {
            self.llm.base_url = provider.default_base_url().into();
        }
        if self.llm.model == previous.default_model() {
            self.llm.model = provider.default_model().into();
        }
        self.llm.provider = provider;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
