//! Healer configuration.
//!
//! Defaults, overlaid by an optional YAML file, overlaid by environment
//! variables. Provider selection is resolved once here; the rest of the
//! system only ever sees a constructed [`SuggestClient`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use suggest_client::{
    ClaudeBackend, ClaudeConfig, GeminiBackend, GeminiConfig, MockBackend, OllamaBackend,
    OllamaConfig, ProviderKind, SuggestClient, SuggestionBackend,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Scratch directory for healer state, relative to the project root.
pub const SCRATCH_DIR: &str = ".selector-healer";

const GEMINI_KEY_ENV_VARS: &[&str] = &["SELECTOR_HEALER_GEMINI_API_KEY", "GEMINI_API_KEY"];
const ANTHROPIC_KEY_ENV_VARS: &[&str] = &[
    "SELECTOR_HEALER_ANTHROPIC_API_KEY",
    "ANTHROPIC_API_KEY",
    "CLAUDE_API_KEY",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read healer config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse healer config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown provider '{0}' (expected gemini, ollama, anthropic or mock)")]
    UnknownProvider(String),

    #[error(
        "{0} is required when using the Gemini provider. \
         Set AI_PROVIDER=ollama to use a local Ollama daemon instead."
    )]
    MissingGeminiKey(&'static str),

    #[error("an Anthropic API key is required when using the Anthropic provider")]
    MissingAnthropicKey,

    #[error("failed to construct suggestion backend: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealerConfig {
    /// Provider label: gemini, ollama, anthropic or mock.
    pub provider: String,

    /// Gemini API key.
    pub api_key: String,

    /// Gemini model variants in priority order.
    pub gemini_models: Vec<String>,

    pub ollama_model: String,
    pub ollama_base_url: String,

    pub anthropic_api_key: String,
    pub anthropic_model: String,

    /// Project root; all healer state lives beneath it.
    pub project_path: PathBuf,

    /// Open a GitHub PR for each healed selector with a known source file.
    pub create_pr: bool,

    /// Accepted for compatibility; healing always makes exactly one
    /// suggestion attempt per failure regardless of this value.
    pub max_retries: u32,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default().label().to_string(),
            api_key: String::new(),
            gemini_models: suggest_client::gemini::DEFAULT_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            ollama_model: suggest_client::ollama::DEFAULT_MODEL.to_string(),
            ollama_base_url: suggest_client::ollama::DEFAULT_BASE_URL.to_string(),
            anthropic_api_key: String::new(),
            anthropic_model: suggest_client::anthropic::DEFAULT_MODEL.to_string(),
            project_path: PathBuf::from("."),
            create_pr: false,
            max_retries: 1,
        }
    }
}

impl HealerConfig {
    /// Load configuration: defaults, then the YAML file when present, then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path)?;
                serde_yaml::from_str(&raw)?
            }
            _ => Self::default(),
        };
        config.apply_env();

        if config.max_retries > 1 {
            debug!(
                max_retries = config.max_retries,
                "max_retries > 1 is accepted but healing still attempts one suggestion per failure"
            );
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(provider) = env_non_empty("AI_PROVIDER") {
            self.provider = provider;
        }
        if let Some(key) = first_env(GEMINI_KEY_ENV_VARS) {
            self.api_key = key;
        }
        if let Some(model) = env_non_empty("GEMINI_MODEL") {
            // An explicit model takes priority but keeps the defaults as
            // fallback variants.
            self.gemini_models.retain(|m| m != &model);
            self.gemini_models.insert(0, model);
        }
        if let Some(model) = env_non_empty("OLLAMA_MODEL") {
            self.ollama_model = model;
        }
        if let Some(url) = env_non_empty("OLLAMA_BASE_URL") {
            self.ollama_base_url = url;
        }
        if let Some(key) = first_env(ANTHROPIC_KEY_ENV_VARS) {
            self.anthropic_api_key = key;
        }
        if let Some(model) = env_non_empty("ANTHROPIC_MODEL") {
            self.anthropic_model = model;
        }
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        ProviderKind::from_str_case(&self.provider)
            .ok_or_else(|| ConfigError::UnknownProvider(self.provider.clone()))
    }

    /// Directory for scratch state (ledger, prompt dumps).
    pub fn scratch_dir(&self) -> PathBuf {
        self.project_path.join(SCRATCH_DIR)
    }

    /// Construct the configured backend and wrap it in a client that dumps
    /// prompts into the scratch directory.
    pub fn build_suggest_client(&self) -> Result<SuggestClient, ConfigError> {
        let kind = self.provider_kind()?;
        let backend: Arc<dyn SuggestionBackend> = match kind {
            ProviderKind::Gemini => {
                if self.api_key.is_empty() {
                    return Err(ConfigError::MissingGeminiKey("GEMINI_API_KEY"));
                }
                let mut config = GeminiConfig::new(self.api_key.clone());
                config.models = self.gemini_models.clone();
                Arc::new(GeminiBackend::new(config).map_err(backend_err)?)
            }
            ProviderKind::Ollama => {
                let config = OllamaConfig {
                    model: self.ollama_model.clone(),
                    base_url: self.ollama_base_url.clone(),
                    timeout: Duration::from_secs(120),
                };
                Arc::new(OllamaBackend::new(config).map_err(backend_err)?)
            }
            ProviderKind::Anthropic => {
                if self.anthropic_api_key.is_empty() {
                    return Err(ConfigError::MissingAnthropicKey);
                }
                let mut config = ClaudeConfig::new(self.anthropic_api_key.clone());
                config.model = self.anthropic_model.clone();
                Arc::new(ClaudeBackend::new(config).map_err(backend_err)?)
            }
            ProviderKind::Mock => {
                warn!("using the mock suggestion backend; no real model will be consulted");
                Arc::new(MockBackend::new())
            }
        };

        debug!(provider = kind.label(), "suggestion backend ready");
        Ok(SuggestClient::new(backend).with_scratch_dir(self.scratch_dir()))
    }
}

fn backend_err(err: suggest_client::SuggestError) -> ConfigError {
    ConfigError::Backend(err.to_string())
}

fn env_non_empty(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env_non_empty(name))
}
