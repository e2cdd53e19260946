//! Pending photo requests, one per consumer.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::PhotoKey;

/// Read access to the keys that still need loading.
///
/// The fetch worker only needs this view, so it does not have to know the
/// consumer handle type.
pub trait PendingKeys: Send + Sync {
    /// Distinct keys wanted by any consumer right now
    fn snapshot_pending_keys(&self) -> HashSet<PhotoKey>;
}

/// Thread-safe map from consumer handle to the key it currently wants.
///
/// A later `put` for the same consumer replaces the earlier key, so a
/// superseded request can never be delivered.
pub struct RequestTable<C> {
    requests: Arc<Mutex<HashMap<C, PhotoKey>>>,
}

impl<C> Clone for RequestTable<C> {
    fn clone(&self) -> Self {
        Self {
            requests: Arc::clone(&self.requests),
        }
    }
}

impl<C: Eq + Hash + Clone> Default for RequestTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Eq + Hash + Clone> RequestTable<C> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<C, PhotoKey>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the key a consumer wants, replacing any earlier one.
    pub fn put(&self, consumer: C, key: PhotoKey) {
        self.lock().insert(consumer, key);
    }

    /// Forget a consumer's request.
    pub fn remove(&self, consumer: &C) -> Option<PhotoKey> {
        self.lock().remove(consumer)
    }

    /// Remove a consumer's request only if it still wants `key`.
    pub fn remove_if(&self, consumer: &C, key: &PhotoKey) -> bool {
        let mut requests = self.lock();
        if requests.get(consumer) == Some(key) {
            requests.remove(consumer);
            true
        } else {
            false
        }
    }

    /// The key a consumer currently wants
    pub fn get(&self, consumer: &C) -> Option<PhotoKey> {
        self.lock().get(consumer).cloned()
    }

    /// Point-in-time copy of all pending requests
    pub fn entries(&self) -> Vec<(C, PhotoKey)> {
        self.lock()
            .iter()
            .map(|(c, k)| (c.clone(), k.clone()))
            .collect()
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all pending requests.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<C: Eq + Hash + Clone + Send> PendingKeys for RequestTable<C> {
    fn snapshot_pending_keys(&self) -> HashSet<PhotoKey> {
        self.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_writer_wins() {
        let table = RequestTable::new();
        table.put(1_u32, PhotoKey::Id(10));
        table.put(1_u32, PhotoKey::Id(11));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&1), Some(PhotoKey::Id(11)));
    }

    #[test]
    fn test_snapshot_dedupes_keys() {
        let table = RequestTable::new();
        table.put("a", PhotoKey::Id(1));
        table.put("b", PhotoKey::Id(1));
        table.put("c", PhotoKey::uri("file:///x.png"));
        let keys = table.snapshot_pending_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&PhotoKey::Id(1)));
    }

    #[test]
    fn test_remove_if_only_matching_key() {
        let table = RequestTable::new();
        table.put("a", PhotoKey::Id(2));
        assert!(!table.remove_if(&"a", &PhotoKey::Id(1)));
        assert!(table.remove_if(&"a", &PhotoKey::Id(2)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_puts() {
        let table = RequestTable::new();
        let handles: Vec<_> = (0..4_u32)
            .map(|t| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for i in 0..100_i64 {
                        table.put(t, PhotoKey::Id(i));
                        let _ = table.snapshot_pending_keys();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 4);
        assert_eq!(table.snapshot_pending_keys(), HashSet::from([PhotoKey::Id(99)]));
    }
}
