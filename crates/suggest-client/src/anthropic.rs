//! Anthropic hosted backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::SuggestionBackend;
use crate::errors::SuggestError;

pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            max_tokens: 256,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct ClaudeBackend {
    client: Client,
    config: ClaudeConfig,
}

impl ClaudeBackend {
    pub fn new(config: ClaudeConfig) -> Result<Self, SuggestError> {
        if config.api_key.is_empty() {
            return Err(SuggestError::BackendUnavailable(
                "missing Anthropic API key".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                SuggestError::BackendUnavailable(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SuggestionBackend for ClaudeBackend {
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError> {
        let url = format!("{}/messages", self.config.api_base.trim_end_matches('/'));

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                SuggestError::BackendUnavailable(format!("claude request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(SuggestError::from_http(status, &text));
        }

        let response: MessagesResponse = response.json().await.map_err(|err| {
            SuggestError::InvalidResponse(format!("claude response invalid: {err}"))
        })?;

        let text = response
            .content
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_key() {
        let err = ClaudeBackend::new(ClaudeConfig::new("")).unwrap_err();
        assert!(matches!(err, SuggestError::BackendUnavailable(_)));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r##"{"content":[{"type":"text","text":"#submit"}]}"##;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .content
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(text, "#submit");
    }
}
