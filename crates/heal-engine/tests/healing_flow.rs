//! End-to-end healing flows against an in-memory fake page.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dom_snapshot_store::DomSnapshotStore;
use heal_engine::{HealingCache, HealingPage, PagePort, SelectorHealer};
use healer_core_types::{HealStatus, PageError};
use result_ledger::ResultLedger;
use suggest_client::{MockBackend, SuggestClient, SuggestError};

const PAGE_HTML: &str =
    "<html><body><input id=\"username\"><button id=\"login\">Sign in</button></body></html>";

/// Fake page: selectors in `locatable` resolve during waits, selectors in
/// `actionable` additionally accept click/fill/type.
struct FakePage {
    html: String,
    locatable: HashSet<String>,
    actionable: HashSet<String>,
    wait_calls: AtomicUsize,
}

impl FakePage {
    fn new(selectors: &[&str]) -> Self {
        let set: HashSet<String> = selectors.iter().map(|s| s.to_string()).collect();
        Self {
            html: PAGE_HTML.to_string(),
            locatable: set.clone(),
            actionable: set,
            wait_calls: AtomicUsize::new(0),
        }
    }

    fn with_unclickable(mut self, selector: &str) -> Self {
        self.locatable.insert(selector.to_string());
        self.actionable.remove(selector);
        self
    }

    fn wait_call_count(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }

    fn check_action(&self, selector: &str) -> Result<(), PageError> {
        if self.actionable.contains(selector) {
            Ok(())
        } else {
            Err(PageError::ElementNotFound(selector.to_string()))
        }
    }
}

#[async_trait]
impl PagePort for FakePage {
    async fn content(&self) -> Result<String, PageError> {
        Ok(self.html.clone())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), PageError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        if self.locatable.contains(selector) {
            Ok(())
        } else {
            Err(PageError::timeout(selector, timeout.as_millis() as u64))
        }
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), PageError> {
        self.check_action(selector)
    }

    async fn fill(
        &self,
        selector: &str,
        _text: &str,
        _timeout: Duration,
    ) -> Result<(), PageError> {
        self.check_action(selector)
    }

    async fn type_text(
        &self,
        selector: &str,
        _text: &str,
        _timeout: Duration,
    ) -> Result<(), PageError> {
        self.check_action(selector)
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    backend: Arc<MockBackend>,
    healing_page: HealingPage,
    cache: Arc<HealingCache>,
    ledger: Arc<ResultLedger>,
    store: DomSnapshotStore,
}

fn harness(page: FakePage) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let store = DomSnapshotStore::new(dir.path());
    let ledger = Arc::new(ResultLedger::new(dir.path()));
    let cache = Arc::new(HealingCache::new());
    let page = Arc::new(page);

    let healer = SelectorHealer::new(
        SuggestClient::new(backend.clone()),
        store.clone(),
    );
    let healing_page = HealingPage::new(
        page.clone() as Arc<dyn PagePort>,
        healer,
        cache.clone(),
        ledger.clone(),
    );

    Harness {
        _dir: dir,
        backend,
        healing_page,
        cache,
        ledger,
        store,
    }
}

#[tokio::test]
async fn test_heal_click_end_to_end() {
    let h = harness(FakePage::new(&["#username", "#login"]));
    h.backend.push_response("#username");

    h.healing_page.click("#username-broken").await.unwrap();

    // One healed ledger entry.
    let entries = h.ledger.read_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, HealStatus::Healed);
    assert_eq!(entries[0].original_selector, "#username-broken");
    assert_eq!(entries[0].new_selector.as_deref(), Some("#username"));

    // Snapshot saved under the original selector's key, equal to the DOM
    // captured during the session.
    let snapshot = h.store.load("#username-broken").await.unwrap().unwrap();
    assert_eq!(snapshot.html, PAGE_HTML);

    // Cache populated for subsequent failures of the same selector.
    let cached = h.cache.get("#username-broken").unwrap();
    assert!(cached.success);
    assert_eq!(cached.new_selector.as_deref(), Some("#username"));
}

#[tokio::test]
async fn test_cached_heal_skips_backend() {
    let h = harness(FakePage::new(&["#username"]));
    h.backend.push_response("#username");

    h.healing_page.click("#username-broken").await.unwrap();
    assert_eq!(h.backend.call_count(), 1);

    // Second failure of the same selector: cache hit, zero extra calls.
    h.healing_page.click("#username-broken").await.unwrap();
    h.healing_page.fill("#username-broken", "admin").await.unwrap();
    assert_eq!(h.backend.call_count(), 1);

    // And no duplicate ledger entries for the cached retries.
    assert_eq!(h.ledger.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_known_failed_selector_short_circuits() {
    let h = harness(FakePage::new(&[]));
    h.backend.push_error(SuggestError::BackendUnavailable("down".into()));

    let first = h.healing_page.click("#gone").await.unwrap_err();
    assert!(matches!(first, PageError::ElementNotFound(_)));
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.ledger.read_all().await.unwrap().len(), 1);

    // Second failure: no new model call, no second ledger entry, original
    // error class re-raised.
    let second = h.healing_page.click("#gone").await.unwrap_err();
    assert!(matches!(second, PageError::ElementNotFound(_)));
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.ledger.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_quota_error_outcome() {
    let h = harness(FakePage::new(&[]));
    h.backend
        .push_error(SuggestError::QuotaExceeded("daily limit hit".into()));

    let err = h.healing_page.click("#username-broken").await.unwrap_err();
    assert!(matches!(err, PageError::ElementNotFound(_)));

    let entries = h.ledger.read_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, HealStatus::Failed);
    assert!(entries[0].new_selector.is_none());

    // No snapshot may exist for a selector that never healed.
    assert!(h.store.load("#username-broken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_quota_error_surfaces_in_outcome_text() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_error(SuggestError::QuotaExceeded("daily limit hit".into()));
    let store = DomSnapshotStore::new(dir.path());
    let healer = SelectorHealer::new(SuggestClient::new(backend), store.clone());
    let page = FakePage::new(&[]);

    let outcome = healer.heal(&page, "#username-broken").await;
    assert!(!outcome.success);
    assert_eq!(outcome.original_selector, "#username-broken");
    assert!(outcome.error.as_deref().unwrap().contains("quota"));
    assert!(outcome.new_selector.is_none());
    assert!(store.load("#username-broken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_suggestion_skips_validation() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_response("");
    let store = DomSnapshotStore::new(dir.path());
    let healer = SelectorHealer::new(SuggestClient::new(backend), store);
    let page = FakePage::new(&[]);

    let outcome = healer.heal(&page, "#gone").await;
    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("AI could not suggest a new selector")
    );
    // No validation attempt was made.
    assert_eq!(page.wait_call_count(), 0);
}

#[tokio::test]
async fn test_suggestion_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_response("#also-broken");
    let store = DomSnapshotStore::new(dir.path());
    let healer = SelectorHealer::new(SuggestClient::new(backend), store.clone())
        .with_validation_timeout(Duration::from_millis(50));
    let page = FakePage::new(&[]);

    let outcome = healer.heal(&page, "#origin").await;
    assert!(!outcome.success);
    assert_eq!(outcome.new_selector.as_deref(), Some("#also-broken"));
    assert_eq!(outcome.error.as_deref(), Some("Suggested selector also failed"));
    assert!(store.load("#origin").await.unwrap().is_none());
}

#[tokio::test]
async fn test_healed_selector_fails_action_retry() {
    // "#flaky" resolves during validation but rejects the click itself.
    let h = harness(FakePage::new(&[]).with_unclickable("#flaky"));
    h.backend.push_response("#flaky");

    let err = h.healing_page.click("#username-broken").await.unwrap_err();
    // The original action error propagates, not the retry's.
    assert!(matches!(err, PageError::ElementNotFound(ref s) if s == "#username-broken"));

    let entries = h.ledger.read_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, HealStatus::Failed);
    assert_eq!(entries[0].new_selector.as_deref(), Some("#flaky"));
}

#[tokio::test]
async fn test_wait_and_type_are_intercepted() {
    let h = harness(FakePage::new(&["#username"]));
    h.backend.push_response("#username");
    h.backend.push_response("#username");

    h.healing_page.wait_for("#stale").await.unwrap();
    h.healing_page
        .type_text("#stale-input", "hello")
        .await
        .unwrap();

    assert_eq!(h.ledger.read_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ledger_write_failure_does_not_mask_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_response("#username");

    // Parent of the ledger path is a file, so every append fails.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let ledger = Arc::new(ResultLedger::at_path(blocker.join("ledger.json")));

    let store = DomSnapshotStore::new(dir.path());
    let healer = SelectorHealer::new(SuggestClient::new(backend), store);
    let page = Arc::new(FakePage::new(&["#username"]));
    let healing_page = HealingPage::new(
        page as Arc<dyn PagePort>,
        healer,
        Arc::new(HealingCache::new()),
        ledger,
    );

    // The heal still succeeds even though recording it could not.
    healing_page.click("#username-broken").await.unwrap();
}
