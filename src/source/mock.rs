//! In-memory photo source for tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::PhotoSource;
use crate::error::{FetchError, FetchResult};

/// Call counters shared between a test and its [`MockSource`]
#[derive(Default)]
pub struct Calls {
    pub bulk: AtomicUsize,
    pub uri: AtomicUsize,
    pub ranking: AtomicUsize,
    /// Ids of every bulk fetch, sorted, in call order
    pub bulk_ids: Mutex<Vec<Vec<i64>>>,
}

impl Calls {
    pub fn bulk(&self) -> usize {
        self.bulk.load(Ordering::SeqCst)
    }

    pub fn uri(&self) -> usize {
        self.uri.load(Ordering::SeqCst)
    }

    pub fn ranking(&self) -> usize {
        self.ranking.load(Ordering::SeqCst)
    }

    pub fn bulk_ids(&self) -> Vec<Vec<i64>> {
        self.bulk_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Default)]
pub struct MockSource {
    pub photos: HashMap<i64, Vec<u8>>,
    pub uris: HashMap<String, Vec<u8>>,
    pub candidates: Vec<i64>,
    pub fail_bulk: bool,
    pub calls: Arc<Calls>,
}

impl MockSource {
    pub fn with_photo(mut self, id: i64, bytes: Vec<u8>) -> Self {
        self.photos.insert(id, bytes);
        self
    }

    pub fn with_uri(mut self, uri: &str, bytes: Vec<u8>) -> Self {
        self.uris.insert(uri.to_string(), bytes);
        self
    }
}

impl PhotoSource for MockSource {
    async fn load_photos(&self, ids: &[i64]) -> FetchResult<Vec<(i64, Vec<u8>)>> {
        self.calls.bulk.fetch_add(1, Ordering::SeqCst);
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        self.calls
            .bulk_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sorted);
        if self.fail_bulk {
            return Err(FetchError::Http("store unavailable".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.photos.get(id).map(|b| (*id, b.clone())))
            .collect())
    }

    async fn open_uri(&self, uri: &str) -> FetchResult<Vec<u8>> {
        self.calls.uri.fetch_add(1, Ordering::SeqCst);
        self.uris
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::Http(format!("HTTP 500 for {uri}")))
    }

    async fn preload_candidates(&self, limit: usize) -> FetchResult<Vec<i64>> {
        self.calls.ranking.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.iter().copied().take(limit).collect())
    }
}
