//! On-disk format of the cache store.
//!
//! The store is a single JSON envelope holding a SHA-256 checksum of the
//! serialized entries, so a truncated or hand-edited file is detected on load.
//! Writes go to a temporary file in the destination directory which is then
//! atomically renamed over the old store.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::{CacheEntry, CacheError};

/// Current version of the store envelope.
pub const STORE_FORMAT: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreEnvelope {
    format: u32,
    saved_at: DateTime<Utc>,
    checksum: String,
    entries: Vec<CacheEntry>,
}

fn checksum(entries: &[CacheEntry]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(entries)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Read a store from `path`.
///
/// Returns `Ok(None)` when no store exists yet.
pub(crate) fn load(path: &Path) -> Result<Option<Vec<CacheEntry>>, CacheError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CacheError::CorruptStore {
                path: path.to_path_buf(),
                reason: format!("unreadable: {e}"),
            })
        }
    };

    let corrupt = |reason: String| CacheError::CorruptStore {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: StoreEnvelope =
        serde_json::from_slice(&content).map_err(|e| corrupt(format!("malformed: {e}")))?;

    if envelope.format != STORE_FORMAT {
        return Err(corrupt(format!(
            "unsupported store format {} (expected {})",
            envelope.format, STORE_FORMAT
        )));
    }

    let calculated = checksum(&envelope.entries).map_err(|e| corrupt(e.to_string()))?;
    if calculated != envelope.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    log::debug!(
        "Loaded {} cache entries saved at {} from {}",
        envelope.entries.len(),
        envelope.saved_at,
        path.display()
    );
    Ok(Some(envelope.entries))
}

/// Atomically replace the store at `path` with `entries`.
///
/// On failure the previous file at `path` is left untouched.
pub(crate) fn save(path: &Path, entries: Vec<CacheEntry>) -> Result<(), CacheError> {
    let io_error = |source: std::io::Error| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let envelope = StoreEnvelope {
        format: STORE_FORMAT,
        saved_at: Utc::now(),
        checksum: checksum(&entries)?,
        entries,
    };
    let json = serde_json::to_vec(&envelope)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_error)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(io_error)?;
    temp.write_all(&json).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;

    log::debug!(
        "Saved {} cache entries to {}",
        envelope.entries.len(),
        path.display()
    );
    Ok(())
}
