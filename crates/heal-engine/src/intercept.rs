//! Transparent interception of element actions.

use std::sync::Arc;
use std::time::Duration;

use healer_core_types::{HealStatus, HealingOutcome, LedgerEntry, PageError};
use result_ledger::ResultLedger;
use tracing::{info, warn};

use crate::cache::{CachedHeal, HealingCache};
use crate::ports::PagePort;
use crate::session::SelectorHealer;

/// Bounded wait on action attempts. Shorter than typical framework
/// defaults so a drifted selector fails fast instead of absorbing the
/// full default wait.
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Call-site label recorded when the caller did not supply one.
const UNKNOWN_CALL_SITE: &str = "auto-detected";

enum Action<'a> {
    Click,
    Fill(&'a str),
    Type(&'a str),
    WaitFor,
}

impl Action<'_> {
    fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Fill(_) => "fill",
            Action::Type(_) => "type",
            Action::WaitFor => "wait_for",
        }
    }
}

/// Decorator around a [`PagePort`] that exposes the same action surface
/// and substitutes a healed selector into an in-flight action when the
/// original fails. Callers keep their selectors and their error handling;
/// an unhealable failure re-raises the original error.
pub struct HealingPage {
    page: Arc<dyn PagePort>,
    healer: SelectorHealer,
    cache: Arc<HealingCache>,
    ledger: Arc<ResultLedger>,
    action_timeout: Duration,
    call_site: Option<(String, u32)>,
}

impl HealingPage {
    pub fn new(
        page: Arc<dyn PagePort>,
        healer: SelectorHealer,
        cache: Arc<HealingCache>,
        ledger: Arc<ResultLedger>,
    ) -> Self {
        Self {
            page,
            healer,
            cache,
            ledger,
            action_timeout: ACTION_TIMEOUT,
            call_site: None,
        }
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Label ledger entries produced by this page with a source location.
    pub fn with_call_site(mut self, file: impl Into<String>, line: u32) -> Self {
        self.call_site = Some((file.into(), line));
        self
    }

    /// The wrapped page handle, for calls outside the intercepted surface.
    pub fn inner(&self) -> &Arc<dyn PagePort> {
        &self.page
    }

    pub async fn click(&self, selector: &str) -> Result<(), PageError> {
        self.run(selector, Action::Click).await
    }

    pub async fn fill(&self, selector: &str, text: &str) -> Result<(), PageError> {
        self.run(selector, Action::Fill(text)).await
    }

    pub async fn type_text(&self, selector: &str, text: &str) -> Result<(), PageError> {
        self.run(selector, Action::Type(text)).await
    }

    pub async fn wait_for(&self, selector: &str) -> Result<(), PageError> {
        self.run(selector, Action::WaitFor).await
    }

    async fn perform(&self, action: &Action<'_>, selector: &str) -> Result<(), PageError> {
        match action {
            Action::Click => self.page.click(selector, self.action_timeout).await,
            Action::Fill(text) => self.page.fill(selector, text, self.action_timeout).await,
            Action::Type(text) => {
                self.page
                    .type_text(selector, text, self.action_timeout)
                    .await
            }
            Action::WaitFor => self.page.wait_for(selector, self.action_timeout).await,
        }
    }

    async fn run(&self, selector: &str, action: Action<'_>) -> Result<(), PageError> {
        match self.perform(&action, selector).await {
            Ok(()) => Ok(()),
            Err(original) => {
                info!(selector, action = action.name(), error = %original, "action failed; attempting recovery");
                self.recover(selector, &action, original).await
            }
        }
    }

    /// Recovery path for one failed action. Exactly one ledger entry is
    /// written per failure event, except the known-failed cache hit which
    /// was already recorded when it first failed.
    async fn recover(
        &self,
        selector: &str,
        action: &Action<'_>,
        original: PageError,
    ) -> Result<(), PageError> {
        if let Some(cached) = self.cache.get(selector) {
            return match cached {
                CachedHeal {
                    success: true,
                    new_selector: Some(new_selector),
                } => {
                    info!(selector, %new_selector, "using cached healing");
                    // Propagate whatever error this retry itself raises.
                    self.perform(action, &new_selector).await
                }
                // Known unhealable this run; the failure is already in the
                // ledger.
                _ => Err(original),
            };
        }

        let outcome = self.healer.heal(self.page.as_ref(), selector).await;

        match (outcome.success, outcome.new_selector.clone()) {
            (true, Some(new_selector)) => {
                self.cache.record_success(selector, &new_selector);
                match self.perform(action, &new_selector).await {
                    Ok(()) => {
                        self.record(&outcome, HealStatus::Healed).await;
                        Ok(())
                    }
                    Err(retry_err) => {
                        warn!(selector, %new_selector, %retry_err, "healed selector also failed");
                        self.record(&outcome, HealStatus::Failed).await;
                        Err(original)
                    }
                }
            }
            _ => {
                info!(
                    selector,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "healing failed"
                );
                self.cache.record_failure(selector);
                self.record(&outcome, HealStatus::Failed).await;
                Err(original)
            }
        }
    }

    /// Ledger writes are best-effort; they never mask the action outcome.
    async fn record(&self, outcome: &HealingOutcome, status: HealStatus) {
        let (file, line) = self
            .call_site
            .clone()
            .unwrap_or_else(|| (UNKNOWN_CALL_SITE.to_string(), 0));
        let entry = LedgerEntry::from_outcome(outcome, status, file, line);
        if let Err(err) = self.ledger.append(entry).await {
            warn!(%err, "failed to record healing result");
        }
    }
}
