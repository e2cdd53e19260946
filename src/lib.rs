//! # contact-photos
//!
//! Photo loading and caching engine for a contacts application.
//!
//! ## Overview
//!
//! UI consumers ask for a photo by key (a photo row id or a URI) and get it
//! back asynchronously, either as a decoded image or as an explicit
//! "show the placeholder". Photos are served from a two-tier LRU cache; misses
//! are batched and fetched by a single background worker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PhotoCacheService                        │
//! │  request • pause/resume • invalidate • preload • delivery   │
//! └─────────────────────────────────────────────────────────────┘
//!          │  Load / Preload            ▲  PhotosLoaded / LoadFinished
//!          ▼                            │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       FetchWorker                           │
//! │  batch ids • fetch URIs one by one • preload in batches     │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │    ByteCache    │ │  DecodedCache   │ │  RequestTable   │
//! │                 │ │                 │ │                 │
//! │ • Size bounded  │ │ • Count bounded │ │ • Consumer→key  │
//! │ • Fresh/stale   │ │ • Ready images  │ │ • Last wins     │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!                              │
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │      PhotoSource      │
//!                  │ • SQLite photo store  │
//!                  │ • HTTP / file URIs    │
//!                  └───────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cache`] — Byte and decoded photo caches
//! - [`config`] — Configuration management
//! - [`models`] — Photo keys and delivered photos
//! - [`requests`] — Pending requests per consumer
//! - [`service`] — The service consumers talk to
//! - [`source`] — Photo store and URI fetching
//! - [`worker`] — Background fetch worker
//!
//! ## Example
//!
//! ```no_run
//! use contact_photos::{Config, ContactsSource, PhotoCacheService, PhotoKey, PhotoStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let source = ContactsSource::new(PhotoStore::open()?, config.http_timeout())?;
//!     let mut photos = PhotoCacheService::new(&config, source, |row: &usize, photo| {
//!         println!("row {row}: {:?}", photo.dimensions());
//!     });
//!
//!     photos.request(0, Some(PhotoKey::Id(42)));
//!     photos.wait_idle().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::ptr_arg)]
#![allow(clippy::uninlined_format_args)]

pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod models;
pub mod paths;
pub mod requests;
pub mod service;
pub mod source;
pub mod worker;

// Re-export main types for convenience
pub use config::Config;
pub use error::{FetchError, FetchResult};
pub use models::{Photo, PhotoKey};
pub use service::{CacheStats, PhotoCacheService};
pub use source::{ContactsSource, PhotoSource, PhotoStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
