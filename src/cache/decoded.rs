//! LRU cache of decoded, display-ready photos.
//!
//! Each image carries its own `fresh` flag so an invalidation reaches photos
//! whose bytes were already evicted from the byte cache.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use lru::LruCache;

use crate::models::PhotoKey;

#[derive(Clone)]
struct DecodedEntry {
    image: Arc<DynamicImage>,
    fresh: bool,
}

/// Thread-safe decoded photo cache, bounded by entry count
#[derive(Clone)]
pub struct DecodedCache {
    images: Arc<Mutex<LruCache<PhotoKey, DecodedEntry>>>,
}

impl DecodedCache {
    /// Create a cache holding at most `max_entries` images (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            images: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<PhotoKey, DecodedEntry>> {
        self.images.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a decoded photo and its freshness, marking it most recently used.
    pub fn get(&self, key: &PhotoKey) -> Option<(Arc<DynamicImage>, bool)> {
        self.lock()
            .get(key)
            .map(|entry| (Arc::clone(&entry.image), entry.fresh))
    }

    /// Store a decoded photo, evicting the least recently used one if full.
    pub fn put(&self, key: PhotoKey, image: Arc<DynamicImage>, fresh: bool) {
        if let Some((evicted, _)) = self.lock().push(key.clone(), DecodedEntry { image, fresh }) {
            if evicted != key {
                tracing::trace!("Evicted decoded photo {evicted}");
            }
        }
    }

    /// Drop the decoded photo for a key.
    pub fn remove(&self, key: &PhotoKey) {
        self.lock().pop(key);
    }

    /// Mark every decoded photo stale.
    pub fn mark_all_stale(&self) {
        for (_, entry) in self.lock().iter_mut() {
            entry.fresh = false;
        }
    }

    /// Number of decoded photos held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clear the entire cache.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
