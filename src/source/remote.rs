//! Fetching single photos by URI.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// Reads photo bytes from `http(s)://` URLs and local files.
#[derive(Clone)]
pub struct UriFetcher {
    client: reqwest::Client,
}

impl UriFetcher {
    /// Create a fetcher whose HTTP requests time out after `timeout`.
    ///
    /// Fails if the HTTP client cannot be set up (TLS backend unavailable).
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Read the whole resource behind `uri`.
    pub async fn fetch(&self, uri: &str) -> FetchResult<Vec<u8>> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            self.fetch_http(uri).await
        } else if let Some(path) = local_path(uri) {
            fetch_file(path).await
        } else {
            Err(FetchError::NotFound(format!("unsupported URI scheme: {uri}")))
        }
    }

    async fn fetch_http(&self, url: &str) -> FetchResult<Vec<u8>> {
        tracing::debug!("Downloading photo: {url}");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Http(format!("HTTP {status}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Map `file://` URIs and bare paths to a filesystem path.
fn local_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if uri.contains("://") {
        None
    } else {
        Some(PathBuf::from(uri))
    }
}

async fn fetch_file(path: PathBuf) -> FetchResult<Vec<u8>> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FetchError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
