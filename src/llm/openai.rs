//! `OpenAiCompatibleProvider`: any OpenAI-compatible `/chat/completions`
//! endpoint. Grok (`https://api.x.ai/v1`) is the default; OpenAI, Groq,
//! LM Studio and vLLM speak the same wire format.
//!
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::llm::provider::{
    http_client, send_json, usage_field, LlmError, LlmResponse, TextProvider,
};

/// Calls `{base_url}/chat/completions`.
///
/// `base_url` includes the version segment (`…/v1`), as OpenAI SDKs expect.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, user: &str, system: &str, json_mode: bool) -> Value {
        let (temperature, max_tokens) = if json_mode {
            (self.config.json_temperature, self.config.json_max_tokens)
        } else {
            (self.config.text_temperature, self.config.text_max_tokens)
        };

        let mut body = json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user",   "content": user   }
            ],
            "stream":      false,
            "temperature": temperature,
            "max_tokens":  max_tokens
        });
        if json_mode && self.config.structured_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    /// POST the body.  The `Authorization: Bearer …` header is attached
    /// **only** when `api_key` is a non-empty string, which keeps keyless
    /// local servers working.
    async fn complete(&self, body: &Value) -> Result<LlmResponse, LlmError> {
        let mut req = self.client.post(self.endpoint()).json(body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let json = send_json(req).await?;
        let response = parse_completion(&json)?;
        response.log_usage(self.name());
        Ok(response)
    }
}

/// Pull `choices[0].message.content` and usage out of a completion.
fn parse_completion(json: &Value) -> Result<LlmResponse, LlmError> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if content.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    Ok(LlmResponse {
        content,
        input_tokens: usage_field(json, "/usage/prompt_tokens"),
        output_tokens: usage_field(json, "/usage/completion_tokens"),
    })
}

#[async_trait]
impl TextProvider for OpenAiCompatibleProvider {
    async fn generate_text(&self, user: &str, system: &str) -> Result<String, LlmError> {
        let body = self.request_body(user, system, false);
        Ok(self.complete(&body).await?.content)
    }

    async fn generate_json(&self, user: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(user, system, true);
        self.complete(&body).await
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
