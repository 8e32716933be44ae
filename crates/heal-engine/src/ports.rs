//! Port trait for the automation page handle.

use std::time::Duration;

use async_trait::async_trait;
use healer_core_types::PageError;

/// Capability surface the healing engine needs from a page: locate an
/// element by selector, perform actions on it with a bounded wait, and
/// serialize the current document. The engine wraps these; it never
/// implements a browser.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Serialize the current document markup.
    async fn content(&self) -> Result<String, PageError>;

    /// Wait until `selector` resolves to an element, up to `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), PageError>;

    /// Click the element matching `selector`.
    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), PageError>;

    /// Replace the value of the element matching `selector`.
    async fn fill(&self, selector: &str, text: &str, timeout: Duration)
        -> Result<(), PageError>;

    /// Type `text` into the element matching `selector`, key by key.
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), PageError>;
}
