//! Run-scoped healing cache.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Last known healing result for one selector within the current run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedHeal {
    /// Replacement that validated, when the heal succeeded.
    pub new_selector: Option<String>,
    pub success: bool,
}

/// Map from selector string to its last healing result.
///
/// Lifetime equals one automation-run process: constructed at startup,
/// shared by reference into the interception layer, never persisted and
/// never shared across worker processes. Consulting it lets repeated
/// failures of the same selector skip the model entirely.
#[derive(Default)]
pub struct HealingCache {
    entries: RwLock<HashMap<String, CachedHeal>>,
}

impl HealingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, selector: &str) -> Option<CachedHeal> {
        self.entries.read().get(selector).cloned()
    }

    /// Record a validated heal for `selector`.
    pub fn record_success(&self, selector: &str, new_selector: &str) {
        self.entries.write().insert(
            selector.to_string(),
            CachedHeal {
                new_selector: Some(new_selector.to_string()),
                success: true,
            },
        );
    }

    /// Record that `selector` could not be healed this run.
    pub fn record_failure(&self, selector: &str) {
        self.entries.write().insert(
            selector.to_string(),
            CachedHeal {
                new_selector: None,
                success: false,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_then_success_hit() {
        let cache = HealingCache::new();
        assert!(cache.get("#a").is_none());

        cache.record_success("#a", "#b");
        let hit = cache.get("#a").unwrap();
        assert!(hit.success);
        assert_eq!(hit.new_selector.as_deref(), Some("#b"));
    }

    #[test]
    fn test_failure_hit() {
        let cache = HealingCache::new();
        cache.record_failure("#a");
        let hit = cache.get("#a").unwrap();
        assert!(!hit.success);
        assert!(hit.new_selector.is_none());
    }

    #[test]
    fn test_latest_entry_wins() {
        let cache = HealingCache::new();
        cache.record_failure("#a");
        cache.record_success("#a", "#b");
        assert!(cache.get("#a").unwrap().success);
        assert_eq!(cache.len(), 1);
    }
}
