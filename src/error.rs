//! Per-key fetch errors.
//!
//! None of these ever reach a photo consumer: the worker logs them and caches
//! the key as confirmed-absent, so the consumer sees the placeholder.

/// Failure to produce bytes (or a decoded image) for one photo key
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source has no data for the key
    #[error("photo not found: {0}")]
    NotFound(String),

    /// Stream or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    Http(String),

    /// The photo store query failed
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The bytes could not be decoded as an image
    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;
