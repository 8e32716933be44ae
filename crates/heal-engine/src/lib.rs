//! Healing orchestration engine.
//!
//! Wraps element actions so a failed lookup triggers one model-assisted
//! recovery attempt, validates the suggestion against the live page, and
//! records every outcome to the result ledger:
//! - [`ports::PagePort`] - the automation page handle the engine wraps
//! - [`session::SelectorHealer`] - one recovery attempt per failure event
//! - [`cache::HealingCache`] - run-scoped memo of healed/unhealable selectors
//! - [`intercept::HealingPage`] - the transparent action wrapper

pub mod cache;
pub mod intercept;
pub mod ports;
pub mod session;

pub use cache::{CachedHeal, HealingCache};
pub use intercept::{HealingPage, ACTION_TIMEOUT};
pub use ports::PagePort;
pub use session::{SelectorHealer, VALIDATION_TIMEOUT};
