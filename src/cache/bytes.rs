//! LRU cache of encoded photo bytes, bounded by total estimated size.
//!
//! Each entry records either the encoded bytes of a photo or the fact that
//! the source has no photo for the key ("confirmed absent"), plus a `fresh`
//! flag. Stale entries are still served but get refetched.
//!
//! The cache keeps a running estimate of the bytes it holds. After every
//! insert it evicts least recently used entries until the estimate is back
//! under the cap. A soft "red zone" at 75% of the cap tells the preloader to
//! stop warming the cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::DynamicImage;
use lru::LruCache;

use super::DecodedCache;
use crate::models::PhotoKey;

/// Cached bytes for one photo key
#[derive(Debug, Clone)]
pub struct ByteEntry {
    /// Encoded photo bytes; `None` when the source confirmed there is no photo
    pub bytes: Option<Arc<[u8]>>,
    /// Whether the entry reflects the latest data in the source
    pub fresh: bool,
}

impl ByteEntry {
    /// A freshly loaded photo
    pub fn loaded(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes.into()),
            fresh: true,
        }
    }

    /// A fresh "no photo" marker
    pub const fn absent() -> Self {
        Self {
            bytes: None,
            fresh: true,
        }
    }

    /// Bytes counted against the cache cap
    pub fn size(&self) -> usize {
        self.bytes.as_ref().map_or(0, |b| b.len())
    }
}

struct Inner {
    entries: LruCache<PhotoKey, ByteEntry>,
    estimated_bytes: usize,
}

/// Thread-safe byte cache
#[derive(Clone)]
pub struct ByteCache {
    inner: Arc<Mutex<Inner>>,
    decoded: DecodedCache,
    max_bytes: usize,
    red_zone_bytes: usize,
}

impl ByteCache {
    /// Create a byte cache capped at `max_bytes`. Removing an entry also drops
    /// the matching entry of `decoded`.
    pub fn new(max_bytes: usize, decoded: DecodedCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::unbounded(),
                estimated_bytes: 0,
            })),
            decoded,
            max_bytes,
            red_zone_bytes: max_bytes - max_bytes / 4,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get an entry, marking it most recently used.
    pub fn get(&self, key: &PhotoKey) -> Option<ByteEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Get an entry without touching recency.
    pub fn peek(&self, key: &PhotoKey) -> Option<ByteEntry> {
        self.lock().entries.peek(key).cloned()
    }

    /// Whether the key has a fresh entry (loaded or confirmed absent).
    pub fn is_fresh(&self, key: &PhotoKey) -> bool {
        self.lock().entries.peek(key).is_some_and(|e| e.fresh)
    }

    /// Insert or replace an entry, then evict least recently used entries
    /// while the estimate exceeds the cap.
    ///
    /// Bytes larger than the whole cap are not retained; the key is stored
    /// as confirmed absent instead.
    pub fn put(&self, key: PhotoKey, entry: ByteEntry) {
        self.insert(key, entry, None);
    }

    /// Like [`put`](Self::put), also storing the image decoded from the
    /// entry's bytes in the same step.
    pub fn put_decoded(&self, key: PhotoKey, entry: ByteEntry, image: Arc<DynamicImage>) {
        self.insert(key, entry, Some(image));
    }

    fn insert(&self, key: PhotoKey, entry: ByteEntry, image: Option<Arc<DynamicImage>>) {
        let entry = if entry.size() > self.max_bytes {
            tracing::warn!(
                "Photo {key} is {} bytes, larger than the {} byte cache; dropping it",
                entry.size(),
                self.max_bytes
            );
            ByteEntry {
                bytes: None,
                fresh: entry.fresh,
            }
        } else {
            entry
        };

        // The decoded tier is only touched while holding the byte lock, so
        // the two tiers never disagree about which bytes an image came from.
        let mut inner = self.lock();
        let added = entry.size();
        let fresh = entry.fresh;
        let replaced = inner.entries.put(key.clone(), entry);
        if let Some(old) = &replaced {
            inner.estimated_bytes = inner.estimated_bytes.saturating_sub(old.size());
        }
        inner.estimated_bytes += added;

        // The entry just inserted is most recently used, so it is only
        // reachable by pop_lru once it is alone.
        while inner.estimated_bytes > self.max_bytes && inner.entries.len() > 1 {
            let Some((evicted, old)) = inner.entries.pop_lru() else {
                break;
            };
            inner.estimated_bytes = inner.estimated_bytes.saturating_sub(old.size());
            tracing::trace!("Evicted photo bytes {evicted} ({} bytes)", old.size());
        }

        match image {
            Some(image) => self.decoded.put(key, image, fresh),
            // A replaced entry must not stay shadowed by its old decode.
            None if replaced.is_some() => self.decoded.remove(&key),
            None => {}
        }
    }

    /// Store an image decoded from `decoded_from`, unless the entry for `key`
    /// has been replaced since those bytes were read. Returns whether it was
    /// stored.
    pub fn store_decoded_if_same(
        &self,
        key: &PhotoKey,
        decoded_from: &Arc<[u8]>,
        image: Arc<DynamicImage>,
    ) -> bool {
        let inner = self.lock();
        match inner.entries.peek(key) {
            Some(entry) if holds(entry, decoded_from) => {
                self.decoded.put(key.clone(), image, entry.fresh);
                true
            }
            _ => false,
        }
    }

    /// Turn the entry for `key` into confirmed absent (keeping its freshness),
    /// unless it has been replaced since `bad_bytes` were read. Returns
    /// whether it was changed.
    pub fn mark_absent_if_same(&self, key: &PhotoKey, bad_bytes: &Arc<[u8]>) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.peek_mut(key) else {
            return false;
        };
        if !holds(entry, bad_bytes) {
            return false;
        }
        let freed = entry.size();
        entry.bytes = None;
        inner.estimated_bytes = inner.estimated_bytes.saturating_sub(freed);
        self.decoded.remove(key);
        true
    }

    /// Remove an entry and its decoded image.
    pub fn remove(&self, key: &PhotoKey) -> Option<ByteEntry> {
        let mut inner = self.lock();
        let removed = inner.entries.pop(key);
        if let Some(old) = &removed {
            inner.estimated_bytes = inner.estimated_bytes.saturating_sub(old.size());
        }
        self.decoded.remove(key);
        removed
    }

    /// Mark every entry stale, decoded images included, without evicting
    /// anything.
    pub fn mark_all_stale(&self) {
        let mut inner = self.lock();
        for (_, entry) in inner.entries.iter_mut() {
            entry.fresh = false;
        }
        self.decoded.mark_all_stale();
    }

    /// Whether the estimate is past the red zone (75% of the cap).
    pub fn is_near_full(&self) -> bool {
        self.lock().estimated_bytes > self.red_zone_bytes
    }

    /// Current estimated size in bytes
    pub fn estimated_bytes(&self) -> usize {
        self.lock().estimated_bytes
    }

    /// Configured cap in bytes
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Number of entries, including confirmed-absent ones
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Clear the entire cache, decoded images included.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.estimated_bytes = 0;
        self.decoded.clear();
    }
}

fn holds(entry: &ByteEntry, bytes: &Arc<[u8]>) -> bool {
    entry.bytes.as_ref().is_some_and(|b| Arc::ptr_eq(b, bytes))
}
