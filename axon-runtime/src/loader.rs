//! Batch matching for generated dataloaders
//!
//! Generated loader bodies hand the batched response here to align it with
//! the original request keys. Output order follows the key order, never the
//! response order, so the batching layer can zip results back onto the
//! GraphQL field requests by position. A key with no match yields `None`
//! (1:1) or an empty vec (1:N) — a missing match is not exceptional.

use std::time::Duration;

/// Batching window configuration carried by generated loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    /// How long the loader waits to accumulate keys before dispatching.
    pub wait: Duration,
    /// Maximum keys dispatched in one underlying call.
    pub max_batch: usize,
}

impl Default for BatchWindow {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(10),
            max_batch: 100,
        }
    }
}

/// 1:1 matching: for each key, the first response entry whose extracted
/// key equals it. First match wins; duplicates in the response are
/// silently ignored.
pub fn collect_one<K, T, F>(keys: &[K], items: &[T], key_of: F) -> Vec<Option<T>>
where
    K: PartialEq,
    T: Clone,
    F: Fn(&T) -> K,
{
    keys.iter()
        .map(|key| items.iter().find(|item| key_of(item) == *key).cloned())
        .collect()
}

/// 1:N matching: for each key, every response entry whose extracted key
/// equals it, in response order within the key's slot.
pub fn collect_many<K, T, F>(keys: &[K], items: &[T], key_of: F) -> Vec<Vec<T>>
where
    K: PartialEq,
    T: Clone,
    F: Fn(&T) -> K,
{
    keys.iter()
        .map(|key| {
            items
                .iter()
                .filter(|item| key_of(item) == *key)
                .cloned()
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        key: i64,
        label: &'static str,
    }

    fn row(key: i64, label: &'static str) -> Row {
        Row { key, label }
    }

    #[test]
    fn test_collect_one_orders_by_keys_with_nil_gaps() {
        let keys = [1, 2, 3];
        let items = [row(1, "A"), row(3, "C")];
        let result = collect_one(&keys, &items, |r| r.key);
        assert_eq!(
            result,
            vec![Some(row(1, "A")), None, Some(row(3, "C"))]
        );
    }

    #[test]
    fn test_collect_one_first_match_wins() {
        let keys = [7];
        let items = [row(7, "first"), row(7, "second")];
        let result = collect_one(&keys, &items, |r| r.key);
        assert_eq!(result, vec![Some(row(7, "first"))]);
    }

    #[test]
    fn test_collect_many_groups_and_leaves_empty() {
        let keys = [1, 2];
        let items = [row(1, "A"), row(1, "B")];
        let result = collect_many(&keys, &items, |r| r.key);
        assert_eq!(result, vec![vec![row(1, "A"), row(1, "B")], vec![]]);
    }

    #[test]
    fn test_result_order_follows_keys_not_response() {
        let keys = [2, 1];
        let items = [row(1, "A"), row(2, "B")];
        let result = collect_one(&keys, &items, |r| r.key);
        assert_eq!(result, vec![Some(row(2, "B")), Some(row(1, "A"))]);
    }

    #[test]
    fn test_empty_keys_yield_empty_result() {
        let keys: [i64; 0] = [];
        let items = [row(1, "A")];
        assert!(collect_one(&keys, &items, |r| r.key).is_empty());
        assert!(collect_many(&keys, &items, |r| r.key).is_empty());
    }
}
