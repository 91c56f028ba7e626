//! Fingerprint caching for similar-images.
//!
//! Computing a fingerprint means decoding a whole image, so the trawler
//! memoizes results across runs in a [`PersistentCache`].
//!
//! # Architecture
//!
//! * [`entry`]: cache keys and the records stored under them.
//! * [`store`]: the in-memory LRU store shared by all hashing workers.
//! * [`persist`]: the checksummed JSON envelope written to disk.
//!
//! # Cache Invalidation
//!
//! Keys are derived from the file path, size and modification time. A file
//! that changes gets a new key; its old entry is never looked up again and is
//! eventually evicted as least recently used. Entries written by a different
//! [`ALGORITHM_VERSION`](crate::hash::ALGORITHM_VERSION) are treated as misses
//! by the trawler.

pub mod entry;
pub mod persist;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use entry::{CacheEntry, CacheKey};
pub use store::{CacheStats, PersistentCache};

/// Errors that can occur while loading or saving the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store exists but cannot be used.
    #[error("Cache store {path} is corrupt: {reason}")]
    CorruptStore {
        /// Location of the store
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Writing the store failed.
    #[error("Failed to write cache store {path}: {source}")]
    Io {
        /// Destination being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Entries could not be serialized.
    #[error("Failed to serialize cache store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
