//! Core `TextProvider` trait, its error type and provider selection.
//!
//! Two backends implement the trait:
//!
//! | `LlmProvider`       | Type                          | Endpoint                  |
//! |---------------------|-------------------------------|---------------------------|
//! | `Anthropic`         | [`AnthropicProvider`]         | `{base}/v1/messages`      |
//! | `OpenAiCompatible`  | [`OpenAiCompatibleProvider`]  | `{base}/chat/completions` |
//!
//! [`build_provider`] picks one from [`LlmConfig`] once at startup; callers
//! only ever see `Arc<dyn TextProvider>`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{LlmConfig, LlmProvider};
use crate::llm::anthropic::AnthropicProvider;
use crate::llm::openai::OpenAiCompatibleProvider;
use crate::llm::retry::Transient;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while calling a text-completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("LLM provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// Required settings (usually the API key) are missing.
    #[error("LLM provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

impl Transient for LlmError {
    /// Transport failures, timeouts, rate limiting and server errors.
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::Timeout => true,
            LlmError::Http { status, .. } => is_transient_status(*status),
            LlmError::Parse(_) | LlmError::EmptyResponse | LlmError::NotConfigured(_) => false,
        }
    }
}

/// HTTP 429 and 5xx are worth retrying.
pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

// ---------------------------------------------------------------------------
// LlmResponse
// ---------------------------------------------------------------------------

/// Text content plus token usage, when the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl LlmResponse {
    pub(crate) fn log_usage(&self, provider: &str) {
        match (self.input_tokens, self.output_tokens) {
            (Some(input), Some(output)) => {
                log::info!("{provider}: token usage input={input} output={output}")
            }
            _ => log::debug!("{provider}: no token usage reported"),
        }
    }
}

// ---------------------------------------------------------------------------
// TextProvider trait
// ---------------------------------------------------------------------------

/// Async trait for text-completion backends.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (held as `Arc<dyn TextProvider>`).
///
/// # Arguments
/// * `user`   – The user message.
/// * `system` – The system instruction.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Free-form text (the passage).  Trimmed, never empty on success.
    async fn generate_text(&self, user: &str, system: &str) -> Result<String, LlmError>;

    /// A response expected to contain JSON.  Providers that support a
    /// JSON-only mode enable it here.
    async fn generate_json(&self, user: &str, system: &str) -> Result<LlmResponse, LlmError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Provider selection
// ---------------------------------------------------------------------------

/// Build the provider named by `config.provider`.
///
/// # Errors
/// [`LlmError::NotConfigured`] when Anthropic is selected without an API
/// key.  OpenAI-compatible endpoints may be keyless (local servers).
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn TextProvider>, LlmError> {
    let provider: Arc<dyn TextProvider> = match config.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        LlmProvider::OpenAiCompatible => Arc::new(OpenAiCompatibleProvider::from_config(config)),
    };
    log::info!(
        "llm: using {} provider (model={}, base_url={})",
        provider.name(),
        config.model,
        config.base_url
    );
    Ok(provider)
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

/// HTTP client with the per-request timeout from config.  A default client
/// is the fallback if the builder fails.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send `request` and turn a non-success status into [`LlmError::Http`].
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, LlmError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Http {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))
}

/// Read a `u32` token counter from a usage object.
pub(crate) fn usage_field(json: &serde_json::Value, pointer: &str) -> Option<u32> {
    json.pointer(pointer)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

// ---------------------------------------------------------------------------
// MockTextProvider  (test-only)
// ---------------------------------------------------------------------------

/// A test double with separate scripts for text and JSON calls.  Each call
/// pops the next scripted result; an exhausted script answers with the
/// default content.
#[cfg(test)]
pub struct MockTextProvider {
    text_script: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    json_script: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    default_text: String,
    default_json: String,
    text_calls: std::sync::atomic::AtomicUsize,
    json_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockTextProvider {
    pub fn new(text: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            text_script: Default::default(),
            json_script: Default::default(),
            default_text: text.into(),
            default_json: json.into(),
            text_calls: Default::default(),
            json_calls: Default::default(),
        }
    }

    pub fn then_text(self, result: Result<String, LlmError>) -> Self {
        if let Ok(mut script) = self.text_script.lock() {
            script.push_back(result);
        }
        self
    }

    pub fn then_json(self, result: Result<String, LlmError>) -> Self {
        if let Ok(mut script) = self.json_script.lock() {
            script.push_back(result);
        }
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn json_calls(&self) -> usize {
        self.json_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate_text(&self, _user: &str, _system: &str) -> Result<String, LlmError> {
        self.text_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.text_script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(self.default_text.clone()))
    }

    async fn generate_json(&self, _user: &str, _system: &str) -> Result<LlmResponse, LlmError> {
        self.json_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.json_script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(self.default_json.clone()))
            .map(|content| LlmResponse {
                content,
                input_tokens: None,
                output_tokens: None,
            })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Request("reset".into()).is_transient());
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::Http { status: 429, body: String::new() }.is_transient());
        assert!(LlmError::Http { status: 503, body: String::new() }.is_transient());

        assert!(!LlmError::Http { status: 400, body: String::new() }.is_transient());
        assert!(!LlmError::Http { status: 401, body: String::new() }.is_transient());
        assert!(!LlmError::Parse("bad".into()).is_transient());
        assert!(!LlmError::EmptyResponse.is_transient());
        assert!(!LlmError::NotConfigured("key".into()).is_transient());
    }

    #[test]
    fn anthropic_without_key_is_not_configured() {
        let config = LlmConfig::default();
        assert!(matches!(build_provider(&config), Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn builds_selected_provider() {
        let mut config = LlmConfig {
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "anthropic");

        config.provider = LlmProvider::OpenAiCompatible;
        config.api_key = None;
        assert_eq!(build_provider(&config).unwrap().name(), "openai-compatible");
    }

    #[test]
    fn usage_field_reads_nested_counters() {
        let json = serde_json::json!({"usage": {"input_tokens": 12, "output_tokens": -1}});
        assert_eq!(usage_field(&json, "/usage/input_tokens"), Some(12));
        assert_eq!(usage_field(&json, "/usage/output_tokens"), None);
        assert_eq!(usage_field(&json, "/usage/missing"), None);
    }
}
