//! Cache keys and entry definitions.

use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::hash::Fingerprint;

/// Identity-derived key for a file.
///
/// The key is a BLAKE3 digest of the path, size and modification time, never
/// of the content. Touching or resizing a file therefore produces a new key and
/// the stale entry simply ages out of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a file identity.
    #[must_use]
    pub fn for_file(path: &Path, size: u64, modified: SystemTime) -> Self {
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(path.as_os_str().as_encoded_bytes());
        // Separator so "/a" + size cannot collide with "/a<bytes>".
        hasher.update(&[0]);
        hasher.update(&size.to_le_bytes());
        hasher.update(&since_epoch.as_secs().to_le_bytes());
        hasher.update(&since_epoch.subsec_nanos().to_le_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Derive the key from already fetched metadata.
    #[must_use]
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        Self::for_file(path, metadata.len(), modified)
    }

    /// Wrap an existing key string, e.g. one read back from disk.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached fingerprint for one file identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Identity of the file the fingerprint was computed for
    pub key: CacheKey,
    /// Cached fingerprint
    pub fingerprint: Fingerprint,
    /// Algorithm version that produced the fingerprint
    pub version: u32,
    /// Recency tick; higher means more recently used
    pub last_used: u64,
}
