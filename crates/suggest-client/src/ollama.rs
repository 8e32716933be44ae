//! Ollama local-daemon backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::SuggestionBackend;
use crate::errors::SuggestError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "hhao/qwen2.5-coder-tools:7b";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            // Local models can be slow to load on first use.
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, SuggestError> {
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
impl SuggestionBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError> {
        let url = format!(
            "{}/api/generate",
            self.config.base_url.trim_end_matches('/')
        );

        let body = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                SuggestError::BackendUnavailable(format!(
                    "ollama daemon unreachable at {}: {err}",
                    self.config.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(SuggestError::from_http(status, &text));
        }

        let response: GenerateResponse = response.json().await.map_err(|err| {
            SuggestError::InvalidResponse(format!("ollama response invalid: {err}"))
        })?;

        Ok(response.response)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
