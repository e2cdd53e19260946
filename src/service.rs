//! The photo cache service consumers talk to.
//!
//! The service lives on the delivery side: whoever owns it calls
//! [`PhotoCacheService::request`] and pumps worker events with
//! [`PhotoCacheService::poll`] (from a sync UI loop) or
//! [`PhotoCacheService::next_event`] (from async code). Photos are handed to
//! the delivery callback on that same side, never from the worker task.

use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cache::{ByteCache, DecodedCache};
use crate::config::Config;
use crate::decode::decode_photo;
use crate::models::{Photo, PhotoKey};
use crate::requests::RequestTable;
use crate::source::PhotoSource;
use crate::worker::{WorkerContext, WorkerEvent, WorkerMessage, WorkerSettings, spawn_worker};

/// Callback receiving photos for consumers
pub type DeliverFn<C> = Box<dyn FnMut(&C, Photo) + Send>;

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the byte cache, confirmed-absent ones included
    pub byte_entries: usize,
    /// Estimated size of the byte cache
    pub estimated_bytes: usize,
    /// Decoded photos held
    pub decoded_entries: usize,
    /// Consumers still waiting for a photo
    pub pending: usize,
}

/// Photo cache and loader for consumers identified by handles of type `C`.
pub struct PhotoCacheService<C> {
    bytes: ByteCache,
    decoded: DecodedCache,
    requests: RequestTable<C>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    deliver: DeliverFn<C>,
    max_photo_dimension: u32,
    paused: bool,
    loading_requested: bool,
    preload_done: bool,
}

impl<C> PhotoCacheService<C>
where
    C: Eq + Hash + Clone + Send + 'static,
{
    /// Create the service and spawn its fetch worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<S, F>(config: &Config, source: S, deliver: F) -> Self
    where
        S: PhotoSource,
        F: FnMut(&C, Photo) + Send + 'static,
    {
        let decoded = DecodedCache::new(config.max_decoded_entries);
        let bytes = ByteCache::new(config.max_byte_cache_bytes, decoded.clone());
        let requests = RequestTable::new();

        let (event_tx, events) = mpsc::unbounded_channel();
        let worker_tx = spawn_worker(
            source,
            WorkerContext {
                bytes: bytes.clone(),
                pending: Arc::new(requests.clone()),
            },
            WorkerSettings {
                preload_batch_size: config.preload_batch_size,
                preload_max_count: config.preload_max_count,
                preload_batch_delay: config.preload_batch_delay(),
                max_photo_dimension: config.max_photo_dimension,
            },
            event_tx,
        );

        Self {
            bytes,
            decoded,
            requests,
            worker_tx,
            events,
            deliver: Box::new(deliver),
            max_photo_dimension: config.max_photo_dimension,
            paused: false,
            loading_requested: false,
            preload_done: false,
        }
    }

    /// Ask for the photo behind `key` on behalf of `consumer`.
    ///
    /// `None` (or a key meaning "no photo") delivers the placeholder right
    /// away. A cached photo is delivered right away too; a stale one is then
    /// refreshed in the background and delivered again. Otherwise the request
    /// replaces whatever `consumer` asked for before and is delivered once the
    /// worker has fetched it.
    pub fn request(&mut self, consumer: C, key: Option<PhotoKey>) {
        let key = match key {
            Some(key) if !key.is_none() => key,
            _ => {
                self.requests.remove(&consumer);
                (self.deliver)(&consumer, Photo::Placeholder);
                return;
            }
        };

        match self.resolve(&key) {
            Some((photo, true)) => {
                self.requests.remove(&consumer);
                (self.deliver)(&consumer, photo);
            }
            Some((photo, false)) => {
                (self.deliver)(&consumer, photo);
                self.requests.put(consumer, key);
                self.request_loading();
            }
            None => {
                self.requests.put(consumer, key);
                self.request_loading();
            }
        }
    }

    /// Stop dispatching loads and delivering results. Pending requests stay
    /// queued; an in-flight load still completes into the cache.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Undo [`pause`](Self::pause), serving whatever is cached by now and
    /// loading the rest.
    pub fn resume(&mut self) {
        self.paused = false;
        self.process_pending();
    }

    /// Whether the service is paused
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Mark every cached photo stale. Nothing is evicted or refetched now;
    /// stale photos are refreshed the next time they are requested.
    pub fn invalidate(&self) {
        self.bytes.mark_all_stale();
    }

    /// Start warming the cache in the background. Does nothing once
    /// preloading has finished.
    pub fn preload(&self) {
        if self.preload_done {
            return;
        }
        let _ = self.worker_tx.send(WorkerMessage::Preload);
    }

    /// Whether preloading reached its terminal state
    pub const fn is_preload_done(&self) -> bool {
        self.preload_done
    }

    /// Whether a load cycle has been requested and not yet finished
    pub const fn is_loading(&self) -> bool {
        self.loading_requested
    }

    /// Drop all pending requests and cached photos.
    pub fn clear(&mut self) {
        self.requests.clear();
        self.bytes.clear();
    }

    /// Current cache occupancy
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            byte_entries: self.bytes.len(),
            estimated_bytes: self.bytes.estimated_bytes(),
            decoded_entries: self.decoded.len(),
            pending: self.requests.len(),
        }
    }

    /// Handle every worker event that has already arrived (non-blocking).
    /// Returns the number of events handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next worker event and handle it.
    /// Returns `None` once the worker is gone.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        let event = self.events.recv().await?;
        self.handle_event(event);
        Some(event)
    }

    /// Handle worker events until no load cycle is outstanding.
    pub async fn wait_idle(&mut self) {
        while self.loading_requested {
            if self.next_event().await.is_none() {
                break;
            }
        }
    }

    /// Handle worker events until preloading has finished.
    pub async fn wait_for_preload(&mut self) {
        while !self.preload_done {
            if self.next_event().await.is_none() {
                break;
            }
        }
    }

    /// Stop the fetch worker.
    pub fn shutdown(&self) {
        let _ = self.worker_tx.send(WorkerMessage::Shutdown);
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::PhotosLoaded => {
                if !self.paused {
                    self.process_pending();
                }
            }
            WorkerEvent::LoadFinished => {
                self.loading_requested = false;
                if !self.paused {
                    self.process_pending();
                }
            }
            WorkerEvent::PreloadFinished => self.preload_done = true,
        }
    }

    /// Ask the worker for a load cycle, at most one outstanding at a time.
    fn request_loading(&mut self) {
        if self.paused || self.loading_requested {
            return;
        }
        self.loading_requested = true;
        let _ = self.worker_tx.send(WorkerMessage::Load);
    }

    /// Deliver every pending request that now has a fresh cache entry, and
    /// ask for another load cycle if anything is left.
    fn process_pending(&mut self) {
        for (consumer, key) in self.requests.entries() {
            // Stale hits were already shown when requested.
            if let Some((photo, true)) = self.resolve(&key) {
                if self.requests.remove_if(&consumer, &key) {
                    (self.deliver)(&consumer, photo);
                }
            }
        }

        if !self.requests.is_empty() {
            self.request_loading();
        }
    }

    /// Look a key up in the decoded cache, then the byte cache (decoding on
    /// demand). Returns the photo and whether the entry is fresh, or `None`
    /// on a miss.
    fn resolve(&self, key: &PhotoKey) -> Option<(Photo, bool)> {
        if let Some((image, decoded_fresh)) = self.decoded.get(key) {
            // The bytes may have been evicted; the image keeps its own flag.
            let fresh = decoded_fresh && self.bytes.get(key).is_none_or(|entry| entry.fresh);
            return Some((Photo::Image(image), fresh));
        }

        let entry = self.bytes.get(key)?;
        let Some(bytes) = entry.bytes else {
            return Some((Photo::Placeholder, entry.fresh));
        };

        // The worker may replace the entry while this decode runs; write
        // back only if it still holds the same bytes.
        match decode_photo(&bytes, self.max_photo_dimension) {
            Ok(image) => {
                let image = Arc::new(image);
                self.bytes
                    .store_decoded_if_same(key, &bytes, Arc::clone(&image));
                Some((Photo::Image(image), entry.fresh))
            }
            Err(e) => {
                tracing::warn!("Cannot decode cached photo {key}: {e}");
                self.bytes.mark_absent_if_same(key, &bytes);
                Some((Photo::Placeholder, entry.fresh))
            }
        }
    }
}

impl<C> Drop for PhotoCacheService<C> {
    fn drop(&mut self) {
        let _ = self.worker_tx.send(WorkerMessage::Shutdown);
    }
}
