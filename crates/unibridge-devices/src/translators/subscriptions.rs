//! Reference-counted topic filters.

use std::collections::HashMap;

/// Counts how many bindings of one translator need each filter.
///
/// The transport is subscribed on the first acquire and unsubscribed on the
/// last release, so endpoints sharing a filter do not tear each other down.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    counts: HashMap<String, usize>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this is the first holder of `filter`.
    pub fn acquire(&mut self, filter: &str) -> bool {
        let count = self.counts.entry(filter.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns `true` when the last holder of `filter` let go.
    pub fn release(&mut self, filter: &str) -> bool {
        match self.counts.get_mut(filter) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(filter);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, filter: &str) -> usize {
        self.counts.get(filter).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcounting() {
        let mut set = SubscriptionSet::new();
        assert!(set.acquire("a"));
        assert!(!set.acquire("a"));
        assert_eq!(set.count("a"), 2);
        assert!(!set.release("a"));
        assert!(set.release("a"));
        assert!(!set.release("a"));
        assert!(set.is_empty());
    }
}
