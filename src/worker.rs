//! Background fetch worker.
//!
//! Runs as a single Tokio task and handles its messages strictly one at a
//! time. Urgent loads fetch whatever consumers are waiting for; preloading
//! warms the cache in small delayed batches and never runs ahead of a load.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::cache::{ByteCache, ByteEntry};
use crate::decode::decode_photo;
use crate::models::PhotoKey;
use crate::requests::PendingKeys;
use crate::source::PhotoSource;

/// Messages sent from the service to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Fetch everything consumers are waiting for
    Load,
    /// Start (or continue) warming the cache
    Preload,
    /// Stop the worker
    Shutdown,
}

/// Events sent from the worker back to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    /// New photos landed in the cache
    PhotosLoaded,
    /// A load cycle is complete
    LoadFinished,
    /// Preloading reached its terminal state
    PreloadFinished,
}

/// Tuning knobs for the worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Photos fetched per preload batch
    pub preload_batch_size: usize,
    /// Upper bound on preload candidates
    pub preload_max_count: usize,
    /// Pause between preload batches
    pub preload_batch_delay: Duration,
    /// Downscale bound for eagerly decoded photos
    pub max_photo_dimension: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreloadStatus {
    NotStarted,
    InProgress,
    Done,
}

/// Shared state the worker fills in
pub struct WorkerContext {
    /// Encoded bytes cache, which also owns the decoded tier
    pub bytes: ByteCache,
    /// Keys consumers are waiting for
    pub pending: Arc<dyn PendingKeys>,
}

struct FetchWorker<S> {
    source: Arc<S>,
    ctx: WorkerContext,
    events: mpsc::UnboundedSender<WorkerEvent>,
    settings: WorkerSettings,
    preload_status: PreloadStatus,
    preload_requested: bool,
    /// Remaining preload ids, highest priority last
    preload_queue: Vec<i64>,
    preload_due: Option<Instant>,
}

/// Spawn the worker task and return its message sender.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_worker<S: PhotoSource>(
    source: S,
    ctx: WorkerContext,
    settings: WorkerSettings,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> mpsc::UnboundedSender<WorkerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();

    let worker = FetchWorker {
        source: Arc::new(source),
        ctx,
        events,
        settings,
        preload_status: PreloadStatus::NotStarted,
        preload_requested: false,
        preload_queue: Vec::new(),
        preload_due: None,
    };
    tokio::spawn(worker.run(rx));

    tx
}

impl<S: PhotoSource> FetchWorker<S> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        loop {
            let preload_due = self.preload_due;
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Some(WorkerMessage::Load) => {
                        // Loads always preempt a scheduled preload batch.
                        self.preload_due = None;
                        self.load_pending().await;
                        self.schedule_preload();
                    }
                    Some(WorkerMessage::Preload) => {
                        if self.preload_status == PreloadStatus::Done {
                            self.notify(WorkerEvent::PreloadFinished);
                        } else {
                            self.preload_requested = true;
                            self.schedule_preload();
                        }
                    }
                    Some(WorkerMessage::Shutdown) | None => {
                        tracing::debug!("Photo loader shutting down");
                        break;
                    }
                },
                () = tokio::time::sleep_until(preload_due.unwrap_or_else(Instant::now)), if preload_due.is_some() => {
                    self.preload_due = None;
                    self.preload_batch().await;
                    self.schedule_preload();
                }
            }
        }
    }

    fn notify(&self, event: WorkerEvent) {
        // The service may already be gone during shutdown.
        let _ = self.events.send(event);
    }

    fn schedule_preload(&mut self) {
        if self.preload_requested
            && self.preload_status != PreloadStatus::Done
            && self.preload_due.is_none()
        {
            self.preload_due = Some(Instant::now() + self.settings.preload_batch_delay);
        }
    }

    fn finish_preload(&mut self) {
        self.preload_status = PreloadStatus::Done;
        self.preload_queue.clear();
        self.preload_due = None;
        tracing::debug!(
            "Preloading done. Photos in cache: {}. Total size: {}",
            self.ctx.bytes.len(),
            self.ctx.bytes.estimated_bytes()
        );
        self.notify(WorkerEvent::PreloadFinished);
    }

    /// One load cycle: fetch every pending key that has no fresh entry.
    async fn load_pending(&mut self) {
        let mut ids = Vec::new();
        let mut uris = Vec::new();
        for key in self.ctx.pending.snapshot_pending_keys() {
            if key.is_none() || self.ctx.bytes.is_fresh(&key) {
                continue;
            }
            match key {
                PhotoKey::Id(id) => ids.push(id),
                PhotoKey::Uri(uri) => uris.push(uri),
            }
        }

        if !ids.is_empty() {
            // No point preloading what is being loaded right now.
            if self.preload_status == PreloadStatus::InProgress {
                self.preload_queue.retain(|id| !ids.contains(id));
                if self.preload_queue.is_empty() {
                    self.finish_preload();
                }
            }
            self.load_ids(&ids, false).await;
            self.notify(WorkerEvent::PhotosLoaded);
        }

        for uri in uris {
            self.load_uri(uri).await;
            self.notify(WorkerEvent::PhotosLoaded);
        }

        self.notify(WorkerEvent::LoadFinished);
    }

    /// One preload step: query the ranking on the first call, then fetch a
    /// batch per call until the ranking is exhausted or the cache is near full.
    async fn preload_batch(&mut self) {
        match self.preload_status {
            PreloadStatus::Done => return,
            PreloadStatus::NotStarted => {
                match self
                    .source
                    .preload_candidates(self.settings.preload_max_count)
                    .await
                {
                    Ok(mut ids) => {
                        ids.reverse();
                        self.preload_queue = ids;
                    }
                    Err(e) => tracing::warn!("Failed to query photos for preload: {e}"),
                }

                if self.preload_queue.is_empty() {
                    self.finish_preload();
                } else {
                    tracing::debug!("Preloading up to {} photos", self.preload_queue.len());
                    self.preload_status = PreloadStatus::InProgress;
                }
                return;
            }
            PreloadStatus::InProgress => {}
        }

        if self.ctx.bytes.is_near_full() {
            self.finish_preload();
            return;
        }

        let mut ids = Vec::with_capacity(self.settings.preload_batch_size);
        while ids.len() < self.settings.preload_batch_size.max(1) {
            let Some(id) = self.preload_queue.pop() else {
                break;
            };
            if !self.ctx.bytes.is_fresh(&PhotoKey::Id(id)) {
                ids.push(id);
            }
        }

        if !ids.is_empty() {
            self.load_ids(&ids, true).await;
            tracing::trace!(
                "Preloaded {} photos. Photos in cache: {}. Total size: {}",
                ids.len(),
                self.ctx.bytes.len(),
                self.ctx.bytes.estimated_bytes()
            );
            self.notify(WorkerEvent::PhotosLoaded);
        }

        if self.preload_queue.is_empty() {
            self.finish_preload();
        }
    }

    /// Bulk-fetch photo ids. Ids the source does not return are cached as
    /// confirmed absent; a failed query does the same for the whole batch.
    async fn load_ids(&self, ids: &[i64], preloading: bool) {
        let mut missing: HashSet<i64> = ids.iter().copied().collect();

        match self.source.load_photos(ids).await {
            Ok(rows) => {
                for (id, bytes) in rows {
                    if missing.remove(&id) {
                        self.cache_photo(PhotoKey::Id(id), Some(bytes), preloading);
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to load {} photos: {e}", ids.len()),
        }

        for id in missing {
            self.cache_photo(PhotoKey::Id(id), None, preloading);
        }
    }

    async fn load_uri(&self, uri: String) {
        match self.source.open_uri(&uri).await {
            Ok(bytes) => self.cache_photo(PhotoKey::Uri(uri), Some(bytes), false),
            Err(e) => {
                tracing::debug!("Cannot load photo {uri}: {e}");
                self.cache_photo(PhotoKey::Uri(uri), None, false);
            }
        }
    }

    /// Store fetched bytes. Unless preloading, decode right away so the
    /// delivery side finds a ready image.
    fn cache_photo(&self, key: PhotoKey, bytes: Option<Vec<u8>>, preloading: bool) {
        let bytes = match bytes {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                self.ctx.bytes.put(key, ByteEntry::absent());
                return;
            }
        };

        if preloading {
            self.ctx.bytes.put(key, ByteEntry::loaded(bytes));
            return;
        }

        match decode_photo(&bytes, self.settings.max_photo_dimension) {
            Ok(image) => {
                self.ctx
                    .bytes
                    .put_decoded(key, ByteEntry::loaded(bytes), Arc::new(image));
            }
            Err(e) => {
                tracing::debug!("Cannot decode photo {key}: {e}");
                self.ctx.bytes.put(key, ByteEntry::absent());
            }
        }
    }
}
