//! One healing session per failure event.

use std::time::Duration;

use dom_snapshot_store::DomSnapshotStore;
use healer_core_types::{DomSnapshot, HealingOutcome, PageError, SuggestionRequest};
use suggest_client::SuggestClient;
use tracing::{debug, info, warn};

use crate::ports::PagePort;

/// Bounded wait while validating a suggested selector on the live page.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome error when the backend produced no usable suggestion.
const NO_SUGGESTION: &str = "AI could not suggest a new selector";

/// Outcome error when the suggestion did not resolve within the bound.
const VALIDATION_FAILED: &str = "Suggested selector also failed";

/// Orchestrates one failed-selector recovery: fetch current and historical
/// DOM, request a single suggestion, validate it against the live page,
/// persist the snapshot on success. Stateless per invocation; every
/// internal error is converted into the returned [`HealingOutcome`].
pub struct SelectorHealer {
    suggest: SuggestClient,
    store: DomSnapshotStore,
    validation_timeout: Duration,
}

impl SelectorHealer {
    pub fn new(suggest: SuggestClient, store: DomSnapshotStore) -> Self {
        Self {
            suggest,
            store,
            validation_timeout: VALIDATION_TIMEOUT,
        }
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Run one healing session for `selector` against `page`.
    ///
    /// At most one suggestion request is made per failure event; repeated
    /// failures of the same selector within a run are the healing cache's
    /// job, not this session's.
    pub async fn heal(&self, page: &dyn PagePort, selector: &str) -> HealingOutcome {
        info!(selector, backend = self.suggest.backend_name(), "auto-healing selector");

        // Fetch snapshots: current unconditionally, historical if present.
        let current = match page.content().await {
            Ok(html) => DomSnapshot::new(html),
            Err(err) => {
                warn!(selector, %err, "failed to capture current DOM");
                return HealingOutcome::failed(selector, err.to_string());
            }
        };

        let historical = match self.store.load(selector).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                // Historical markup is an optimization; keep going without it.
                warn!(selector, %err, "failed to load historical DOM");
                None
            }
        };
        debug!(
            selector,
            current_bytes = current.len(),
            has_historical = historical.is_some(),
            "snapshots ready"
        );

        let mut request = SuggestionRequest::new(selector, current.clone());
        if let Some(snapshot) = historical {
            request = request.with_historical(snapshot);
        }

        // Exactly one suggestion request.
        let suggestion = match self.suggest.suggest(&request).await {
            Ok(text) => text,
            Err(err) => {
                warn!(selector, %err, "suggestion request failed");
                return HealingOutcome::failed(selector, err.to_string());
            }
        };

        if suggestion.is_empty() {
            return HealingOutcome::failed(selector, NO_SUGGESTION);
        }

        // Validate against the live page with a short bounded wait. The
        // bound is enforced here as well as passed down, so a misbehaving
        // page handle cannot stall the session.
        let validation = tokio::time::timeout(
            self.validation_timeout,
            page.wait_for(&suggestion, self.validation_timeout),
        )
        .await
        .unwrap_or_else(|_| {
            Err(PageError::timeout(
                suggestion.clone(),
                self.validation_timeout.as_millis() as u64,
            ))
        });

        match validation {
            Ok(()) => {
                // Keep this DOM as the known-good baseline for future
                // failures of the original selector.
                if let Err(err) = self.store.save(selector, &current).await {
                    warn!(selector, %err, "failed to save healed DOM snapshot");
                }
                info!(selector, new_selector = %suggestion, "healed selector");
                HealingOutcome::healed(selector, suggestion)
            }
            Err(err) => {
                debug!(selector, new_selector = %suggestion, %err, "suggested selector did not validate");
                HealingOutcome::failed_with_candidate(selector, suggestion, VALIDATION_FAILED)
            }
        }
    }
}
