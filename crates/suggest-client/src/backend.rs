//! Backend contract, provider selection and the deterministic mock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::SuggestError;

/// A model backend: one prompt string in, one text completion out.
#[async_trait]
pub trait SuggestionBackend: Send + Sync {
    /// Generate a completion for the prompt. Implementations return the raw
    /// model text; cleanup happens in the client.
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError>;

    /// Short provider label used in logs.
    fn name(&self) -> &'static str;
}

/// Which provider backend to construct. Resolved once at configuration
/// time, never rediscovered at call time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Ollama,
    Anthropic,
    Mock,
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::Ollama
    }
}

impl ProviderKind {
    pub fn from_str_case(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "anthropic" => Some(Self::Anthropic),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Mock => "mock",
        }
    }
}

/// Deterministic backend used for tests and offline development.
///
/// Responses and errors are scripted in FIFO order; every `generate` call
/// is counted so tests can assert how many model calls a flow performed.
#[derive(Default)]
pub struct MockBackend {
    scripted: Mutex<VecDeque<Result<String, SuggestError>>>,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn push_response(&self, text: impl Into<String>) {
        self.scripted.lock().push_back(Ok(text.into()));
    }

    /// Queue an error.
    pub fn push_error(&self, err: SuggestError) {
        self.scripted.lock().push_back(Err(err));
    }

    /// Number of `generate` calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionBackend for MockBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, SuggestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scripted.lock().pop_front().unwrap_or_else(|| {
            Err(SuggestError::BackendUnavailable(
                "mock backend has no scripted response".to_string(),
            ))
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trip() {
        for kind in [
            ProviderKind::Gemini,
            ProviderKind::Ollama,
            ProviderKind::Anthropic,
            ProviderKind::Mock,
        ] {
            assert_eq!(ProviderKind::from_str_case(kind.label()), Some(kind));
        }
        assert_eq!(ProviderKind::from_str_case("OLLAMA"), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::from_str_case("gpt"), None);
    }

    #[tokio::test]
    async fn test_mock_backend_scripted_order() {
        let backend = MockBackend::new();
        backend.push_response("#one");
        backend.push_error(SuggestError::BackendUnavailable("down".into()));

        assert_eq!(backend.generate("p").await.unwrap(), "#one");
        assert!(backend.generate("p").await.is_err());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new();
        let err = backend.generate("p").await.unwrap_err();
        assert!(matches!(err, SuggestError::BackendUnavailable(_)));
    }
}
