//! Shared types for the selector healing pipeline.
//!
//! Everything that crosses a crate boundary lives here: the DOM snapshot
//! value, the suggestion request handed to the model backend, the healing
//! outcome returned up the call chain, and the ledger entry persisted for
//! reporting.

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Full serialized page markup captured at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomSnapshot {
    pub html: String,
    pub captured_at: DateTime<Utc>,
}

impl DomSnapshot {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// One suggestion request, constructed per healing attempt and consumed by
/// exactly one backend call.
#[derive(Clone, Debug)]
pub struct SuggestionRequest {
    /// Selector that failed to resolve on the live page.
    pub broken_selector: String,

    /// Markup of the page as it looks right now.
    pub current: DomSnapshot,

    /// Markup captured the last time this selector healed, if any.
    pub historical: Option<DomSnapshot>,
}

impl SuggestionRequest {
    pub fn new(broken_selector: impl Into<String>, current: DomSnapshot) -> Self {
        Self {
            broken_selector: broken_selector.into(),
            current,
            historical: None,
        }
    }

    pub fn with_historical(mut self, snapshot: DomSnapshot) -> Self {
        self.historical = Some(snapshot);
        self
    }
}

/// Result of one healing session. Immutable once produced.
#[derive(Clone, Debug, Serialize)]
pub struct HealingOutcome {
    pub success: bool,
    pub original_selector: String,
    pub new_selector: Option<String>,
    pub error: Option<String>,
    /// Human-readable hint for updating the test source.
    pub suggestion: Option<String>,
}

impl HealingOutcome {
    /// A validated heal: the suggested selector resolved on the live page.
    pub fn healed(original: impl Into<String>, new_selector: impl Into<String>) -> Self {
        let original = original.into();
        let new_selector = new_selector.into();
        let suggestion = format!(
            "Replace '{}' with '{}' in your test file",
            original, new_selector
        );
        Self {
            success: true,
            original_selector: original,
            new_selector: Some(new_selector),
            error: None,
            suggestion: Some(suggestion),
        }
    }

    /// A failed heal where no candidate selector was ever produced.
    pub fn failed(original: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            original_selector: original.into(),
            new_selector: None,
            error: Some(error.into()),
            suggestion: None,
        }
    }

    /// A failed heal that still carries the candidate which did not
    /// validate, so reporting can distinguish "tried X and X did not work"
    /// from "had nothing to try".
    pub fn failed_with_candidate(
        original: impl Into<String>,
        candidate: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            original_selector: original.into(),
            new_selector: Some(candidate.into()),
            error: Some(error.into()),
            suggestion: None,
        }
    }
}

/// Terminal status of a healing attempt as recorded in the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealStatus {
    Healed,
    Failed,
}

impl HealStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealStatus::Healed => "healed",
            HealStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for HealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse classification of a selector expression, used only for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorKind {
    #[serde(rename = "getByRole")]
    Role,
    #[serde(rename = "getByLabel")]
    Label,
    #[serde(rename = "getByPlaceholder")]
    Placeholder,
    #[serde(rename = "getByText")]
    Text,
    #[serde(rename = "getByTestId")]
    TestId,
    #[serde(rename = "getByTitle")]
    Title,
    #[serde(rename = "cssSelector")]
    Css,
    #[serde(rename = "unknown")]
    Unknown,
}

static ROLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^\[role=["']?|role=|^\[aria-label=["']?|aria-label="#).unwrap());
static LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)^\[for=["']?|label\["#).unwrap());
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^\[placeholder=["']?|placeholder="#).unwrap());
static TEST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)data-testid=|data-test=|data-cy="#).unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)^\[title=["']?|title="#).unwrap());
static TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^text=|:has-text\(|:text\(").unwrap());
static CSS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^#|^\.|^\[|^[a-z]+").unwrap());

impl SelectorKind {
    /// Classify a selector expression by its surface pattern. The selector
    /// is never parsed beyond this.
    pub fn classify(selector: &str) -> Self {
        if selector.is_empty() {
            return SelectorKind::Unknown;
        }
        if ROLE_RE.is_match(selector) {
            return SelectorKind::Role;
        }
        if LABEL_RE.is_match(selector) {
            return SelectorKind::Label;
        }
        if PLACEHOLDER_RE.is_match(selector) {
            return SelectorKind::Placeholder;
        }
        if TEST_ID_RE.is_match(selector) {
            return SelectorKind::TestId;
        }
        if TITLE_RE.is_match(selector) {
            return SelectorKind::Title;
        }
        if TEXT_RE.is_match(selector) {
            return SelectorKind::Text;
        }
        if CSS_RE.is_match(selector) {
            return SelectorKind::Css;
        }
        SelectorKind::Unknown
    }

    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::Role => "getByRole",
            SelectorKind::Label => "getByLabel",
            SelectorKind::Placeholder => "getByPlaceholder",
            SelectorKind::Text => "getByText",
            SelectorKind::TestId => "getByTestId",
            SelectorKind::Title => "getByTitle",
            SelectorKind::Css => "cssSelector",
            SelectorKind::Unknown => "unknown",
        }
    }
}

/// One record in the persisted healing-results ledger. Append-only; there
/// is no update or delete operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub file: String,
    pub line: u32,
    pub original_selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_selector: Option<String>,
    #[serde(rename = "selectorType", skip_serializing_if = "Option::is_none")]
    pub selector_kind: Option<SelectorKind>,
    pub status: HealStatus,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a ledger entry from a healing outcome and a call-site label.
    /// The selector kind is derived from the suggested selector when one
    /// exists.
    pub fn from_outcome(
        outcome: &HealingOutcome,
        status: HealStatus,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            original_selector: outcome.original_selector.clone(),
            new_selector: outcome.new_selector.clone(),
            selector_kind: outcome
                .new_selector
                .as_deref()
                .map(SelectorKind::classify),
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Error raised by the automation page handle when an action or lookup
/// fails. The healing engine wraps these; it never synthesizes them.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    /// Selector did not resolve to any element.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Action or lookup exceeded its bounded wait.
    #[error("Timeout {timeout_ms}ms exceeded waiting for {selector}")]
    Timeout { selector: String, timeout_ms: u64 },

    /// Anything else the page handle reports.
    #[error("Page error: {0}")]
    Other(String),
}

impl PageError {
    pub fn timeout(selector: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            selector: selector.into(),
            timeout_ms,
        }
    }
}
