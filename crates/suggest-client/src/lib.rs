//! Selector suggestion client.
//!
//! One suggestion contract, several interchangeable model backends. The
//! [`SuggestClient`] builds the prompt, optionally persists it for post-hoc
//! debugging, invokes the configured [`SuggestionBackend`], and cleans the
//! raw completion down to a bare selector string.

pub mod anthropic;
pub mod backend;
pub mod errors;
pub mod gemini;
pub mod ollama;
pub mod prompt;

pub use anthropic::{ClaudeBackend, ClaudeConfig};
pub use backend::{MockBackend, ProviderKind, SuggestionBackend};
pub use errors::SuggestError;
pub use gemini::{GeminiBackend, GeminiConfig};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use prompt::{build_prompt, clean_suggestion, truncate_dom, MAX_DOM_BYTES};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use healer_core_types::SuggestionRequest;
use tracing::{debug, warn};

/// File the most recent prompt is dumped to, relative to the scratch dir.
const PROMPT_DUMP_FILE: &str = "last-prompt.txt";

/// The suggestion client: owns one backend and the prompt plumbing around
/// it. Callers are indifferent to which backend is configured.
#[derive(Clone)]
pub struct SuggestClient {
    backend: Arc<dyn SuggestionBackend>,
    scratch_dir: Option<PathBuf>,
}

impl std::fmt::Debug for SuggestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestClient")
            .field("backend", &self.backend.name())
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl SuggestClient {
    pub fn new(backend: Arc<dyn SuggestionBackend>) -> Self {
        Self {
            backend,
            scratch_dir: None,
        }
    }

    /// Persist the exact prompt text of every call under `dir` before the
    /// backend is invoked. Write failures are logged and never fail the
    /// suggestion call.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Ask the backend for a replacement selector. Returns the cleaned
    /// suggestion, which may be empty when the model produced nothing
    /// usable; the caller decides how to treat an empty suggestion.
    pub async fn suggest(&self, request: &SuggestionRequest) -> Result<String, SuggestError> {
        let prompt = build_prompt(request);
        debug!(
            backend = self.backend.name(),
            selector = %request.broken_selector,
            prompt_bytes = prompt.len(),
            "requesting selector suggestion"
        );

        if let Some(dir) = &self.scratch_dir {
            dump_prompt(dir, &prompt).await;
        }

        let raw = self.backend.generate(&prompt).await?;
        Ok(clean_suggestion(&raw))
    }
}

async fn dump_prompt(dir: &Path, prompt: &str) {
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        warn!(%err, dir = %dir.display(), "failed to create prompt scratch dir");
        return;
    }
    let path = dir.join(PROMPT_DUMP_FILE);
    if let Err(err) = tokio::fs::write(&path, prompt).await {
        warn!(%err, path = %path.display(), "failed to dump prompt text");
    }
}
