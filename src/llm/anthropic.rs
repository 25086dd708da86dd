//! `AnthropicProvider`: the Anthropic Messages API (`POST /v1/messages`).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::llm::provider::{
    http_client, send_json, usage_field, LlmError, LlmResponse, TextProvider,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl AnthropicProvider {
    /// Build from config.  The Messages API always needs a key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY is not set".into()))?
            .to_string();

        Ok(Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, user: &str, system: &str, json_mode: bool) -> Value {
        let (temperature, max_tokens) = if json_mode {
            (self.config.json_temperature, self.config.json_max_tokens)
        } else {
            (self.config.text_temperature, self.config.text_max_tokens)
        };
        json!({
            "model":       self.config.model,
            "max_tokens":  max_tokens,
            "temperature": temperature,
            "system":      system,
            "messages": [
                { "role": "user", "content": user }
            ]
        })
    }

    async fn complete(&self, body: &Value) -> Result<LlmResponse, LlmError> {
        let req = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);

        let json = send_json(req).await?;
        let response = parse_message(&json)?;
        response.log_usage(self.name());
        Ok(response)
    }
}

/// Concatenate the `text` blocks of a Messages response.
fn parse_message(json: &Value) -> Result<LlmResponse, LlmError> {
    let blocks = json["content"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("response has no content array".into()))?;

    let content: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    let content = content.trim().to_string();

    if content.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    Ok(LlmResponse {
        content,
        input_tokens: usage_field(json, "/usage/input_tokens"),
        output_tokens: usage_field(json, "/usage/output_tokens"),
    })
}

#[async_trait]
impl TextProvider for AnthropicProvider {
    async fn generate_text(&self, user: &str, system: &str) -> Result<String, LlmError> {
        let body = self.request_body(user, system, false);
        Ok(self.complete(&body).await?.content)
    }

    async fn generate_json(&self, user: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(user, system, true);
        self.complete(&body).await
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-ant-test".into()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn requires_non_blank_key() {
        let mut cfg = config();
        cfg.api_key = Some("  ".into());
        assert!(matches!(
            AnthropicProvider::from_config(&cfg),
            Err(LlmError::NotConfigured(_))
        ));
        assert!(AnthropicProvider::from_config(&config()).is_ok());
    }

    #[test]
    fn endpoint_and_bodies() {
        let provider = AnthropicProvider::from_config(&config()).unwrap();
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");

        let text = provider.request_body("hola", "sys", false);
        assert_eq!(text["system"], "sys");
        assert_eq!(text["messages"][0]["content"], "hola");
        assert_eq!(text["max_tokens"], 1_000);
        assert_eq!(text["model"], "claude-3-7-sonnet-20250219");

        let analysis = provider.request_body("hola", "sys", true);
        assert_eq!(analysis["max_tokens"], 10_000);
    }

    #[test]
    fn parses_text_blocks_and_usage() {
        let json = json!({
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "1}\n"}
            ],
            "usage": {"input_tokens": 100, "output_tokens": 20}
        });
        let response = parse_message(&json).unwrap();
        assert_eq!(response.content, "{\"a\":1}");
        assert_eq!(response.input_tokens, Some(100));
        assert_eq!(response.output_tokens, Some(20));
    }

    #[test]
    fn missing_or_empty_content() {
        assert!(matches!(parse_message(&json!({})), Err(LlmError::Parse(_))));
        assert!(matches!(
            parse_message(&json!({"content": []})),
            Err(LlmError::EmptyResponse)
        ));
    }
}
