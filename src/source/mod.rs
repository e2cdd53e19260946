//! Where photo bytes come from.
//!
//! The fetch worker only talks to a [`PhotoSource`]. [`ContactsSource`] is the
//! stock implementation: photo ids resolve against the local `SQLite`
//! [`PhotoStore`], URIs go through the [`UriFetcher`].

mod remote;
mod store;

#[cfg(test)]
pub(crate) mod mock;

pub use remote::UriFetcher;
pub use store::PhotoStore;

use std::future::Future;
use std::time::Duration;

use crate::error::FetchResult;

/// Data source consulted by the fetch worker
pub trait PhotoSource: Send + Sync + 'static {
    /// Fetch the bytes of every listed photo id that exists, in one round trip.
    /// Ids missing from the result are treated as "no photo".
    fn load_photos(&self, ids: &[i64]) -> impl Future<Output = FetchResult<Vec<(i64, Vec<u8>)>>> + Send;

    /// Fetch the bytes behind a single URI
    fn open_uri(&self, uri: &str) -> impl Future<Output = FetchResult<Vec<u8>>> + Send;

    /// Photo ids to warm the cache with, most relevant first, at most `limit`
    fn preload_candidates(&self, limit: usize) -> impl Future<Output = FetchResult<Vec<i64>>> + Send;
}

/// Photo store plus URI fetcher
#[derive(Clone)]
pub struct ContactsSource {
    store: PhotoStore,
    fetcher: UriFetcher,
}

impl ContactsSource {
    /// Create a source over an opened store
    pub fn new(store: PhotoStore, http_timeout: Duration) -> FetchResult<Self> {
        Ok(Self {
            store,
            fetcher: UriFetcher::new(http_timeout)?,
        })
    }

    /// Get the underlying store
    pub const fn store(&self) -> &PhotoStore {
        &self.store
    }
}

impl PhotoSource for ContactsSource {
    async fn load_photos(&self, ids: &[i64]) -> FetchResult<Vec<(i64, Vec<u8>)>> {
        let store = self.store.clone();
        let ids = ids.to_vec();
        Ok(tokio::task::spawn_blocking(move || store.load_photos(&ids)).await??)
    }

    async fn open_uri(&self, uri: &str) -> FetchResult<Vec<u8>> {
        self.fetcher.fetch(uri).await
    }

    async fn preload_candidates(&self, limit: usize) -> FetchResult<Vec<i64>> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.preload_candidates(limit)).await??)
    }
}
