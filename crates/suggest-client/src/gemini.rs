//! Gemini hosted backend with model-variant failover.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::SuggestionBackend;
use crate::errors::SuggestError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Variants tried in priority order when none are configured explicitly.
pub const DEFAULT_MODELS: &[&str] = &["models/gemini-2.5-flash", "models/gemini-2.0-flash"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model variants in priority order. A model-not-found answer for one
    /// variant moves on to the next; any other error is terminal.
    pub models: Vec<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, SuggestError> {
        if config.api_key.is_empty() {
            return Err(SuggestError::BackendUnavailable(
                "missing Gemini API key".to_string(),
            ));
        }
        if config.models.is_empty() {
            return Err(SuggestError::ModelNotFound(
                "no Gemini model variants configured".to_string(),
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

    async fn invoke_model(&self, model: &str, prompt: &str) -> Result<String, SuggestError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.config.api_base.trim_end_matches('/'),
            model,
            self.config.api_key
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                SuggestError::BackendUnavailable(format!("gemini request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(SuggestError::from_http(status, &text));
        }

        let response: GenerateContentResponse = response.json().await.map_err(|err| {
            SuggestError::InvalidResponse(format!("gemini response invalid: {err}"))
        })?;

        let text = response
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(text)
    }
}

#[async_trait]
impl SuggestionBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError> {
        let mut last_error: Option<SuggestError> = None;

        for (index, model) in self.config.models.iter().enumerate() {
            match self.invoke_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_model_not_found() => {
                    warn!(
                        target: "gemini",
                        %model,
                        attempt = index + 1,
                        remaining = self.config.models.len() - index - 1,
                        "model variant unavailable; trying next"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SuggestError::ModelNotFound("all Gemini model variants exhausted".to_string())
        }))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}
