//! Error taxonomy for suggestion backends.

use thiserror::Error;

/// Errors emitted by suggestion backends.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// Backend reported a rate or usage limit. Terminal for the attempt;
    /// there is no fallback retry within the same call.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Backend unreachable, or it rejected our credentials.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A specific model variant does not exist on the backend. Non-fatal
    /// for backends that carry a variant list; the next variant is tried.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Backend answered but the payload could not be interpreted.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl SuggestError {
    pub fn is_quota(&self) -> bool {
        matches!(self, SuggestError::QuotaExceeded(_))
    }

    pub fn is_model_not_found(&self) -> bool {
        matches!(self, SuggestError::ModelNotFound(_))
    }

    /// Classify a non-success HTTP status + body into the taxonomy.
    pub fn from_http(status: u16, body: &str) -> Self {
        let lowered = body.to_ascii_lowercase();
        if status == 429 || lowered.contains("quota") || lowered.contains("rate limit") {
            return SuggestError::QuotaExceeded(format!("backend returned {status}: {body}"));
        }
        if status == 404 || lowered.contains("not found") {
            return SuggestError::ModelNotFound(format!("backend returned {status}: {body}"));
        }
        if status == 401 || status == 403 {
            return SuggestError::BackendUnavailable(format!(
                "authentication rejected ({status}): {body}"
            ));
        }
        SuggestError::InvalidResponse(format!("backend returned {status}: {body}"))
    }
}
