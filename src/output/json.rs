//! JSON output for scripting.
//!
//! # Output Schema (`scan`)
//!
//! ```json
//! {
//!   "generated_at": "2026-01-01T12:00:00Z",
//!   "images": [
//!     { "path": "/photos/a.jpg", "fingerprint": "8f3c00ff12a4b7e1", "version": 2 }
//!   ],
//!   "summary": {
//!     "root": "/photos",
//!     "discovered": 1,
//!     "hashed": 1,
//!     "failed": 0,
//!     "skipped": 0,
//!     "cache_hits": 0,
//!     "cache_misses": 1,
//!     "duration_ms": 12,
//!     "interrupted": false,
//!     "exit_code": 0,
//!     "exit_code_name": "SI000",
//!     "file_errors": [],
//!     "walk_errors": []
//!   }
//! }
//! ```
//!
//! `find` reports the needle, the threshold and a `matches` array instead of
//! `images`. Fingerprints are always rendered as 16 hex digits.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheStats, PersistentCache};
use crate::error::ExitCode;
use crate::hash::{Fingerprint, Symmetry};
use crate::search::Match;
use crate::trawler::{ImageRecord, TrawlIssue, TrawlSummary};

#[derive(Debug, Clone, Serialize)]
pub struct JsonImage {
    pub path: String,
    pub fingerprint: String,
    pub version: u32,
}

impl From<&ImageRecord> for JsonImage {
    fn from(record: &ImageRecord) -> Self {
        Self {
            path: normalize_path(&record.path),
            fingerprint: record.fingerprint.to_string(),
            version: record.version,
        }
    }
}

/// Trawl statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    pub root: PathBuf,
    pub discovered: usize,
    /// Files that produced a fingerprint
    pub hashed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub duration_ms: u64,
    pub interrupted: bool,
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "SI000")
    pub exit_code_name: String,
    pub file_errors: Vec<TrawlIssue>,
    pub walk_errors: Vec<TrawlIssue>,
}

impl JsonSummary {
    #[must_use]
    pub fn new(summary: &TrawlSummary, exit_code: ExitCode) -> Self {
        Self {
            root: summary.root.clone(),
            discovered: summary.discovered,
            hashed: summary.hashed(),
            failed: summary.failed,
            skipped: summary.skipped,
            cache_hits: summary.cache_hits,
            cache_misses: summary.cache_misses,
            duration_ms: summary.duration.as_millis() as u64,
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
            file_errors: summary.file_errors.clone(),
            walk_errors: summary.walk_errors.clone(),
        }
    }
}

/// Output of the `scan` command.
#[derive(Debug, Clone, Serialize)]
pub struct JsonScanOutput {
    pub generated_at: DateTime<Utc>,
    pub images: Vec<JsonImage>,
    pub summary: JsonSummary,
}

impl JsonScanOutput {
    /// Images are listed in path order.
    #[must_use]
    pub fn new(records: &[ImageRecord], summary: &TrawlSummary, exit_code: ExitCode) -> Self {
        let mut images: Vec<JsonImage> = records.iter().map(JsonImage::from).collect();
        images.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            generated_at: Utc::now(),
            images,
            summary: JsonSummary::new(summary, exit_code),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonMatch {
    pub path: String,
    pub fingerprint: String,
    pub similarity: u8,
    pub distance: u32,
    pub symmetry: Symmetry,
}

impl From<&Match> for JsonMatch {
    fn from(m: &Match) -> Self {
        Self {
            path: normalize_path(&m.path),
            fingerprint: m.fingerprint.to_string(),
            similarity: m.similarity,
            distance: m.distance,
            symmetry: m.symmetry,
        }
    }
}

/// Output of the `find` command.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFindOutput {
    pub generated_at: DateTime<Utc>,
    pub needle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needle_path: Option<String>,
    pub min_similarity: u8,
    pub consider_symmetry: bool,
    /// Best match first
    pub matches: Vec<JsonMatch>,
    pub summary: JsonSummary,
}

impl JsonFindOutput {
    #[must_use]
    pub fn new(
        needle: Fingerprint,
        needle_path: Option<&Path>,
        min_similarity: u8,
        consider_symmetry: bool,
        matches: &[Match],
        summary: &TrawlSummary,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            needle: needle.to_string(),
            needle_path: needle_path.map(normalize_path),
            min_similarity,
            consider_symmetry,
            matches: matches.iter().map(JsonMatch::from).collect(),
            summary: JsonSummary::new(summary, exit_code),
        }
    }
}

/// Output of `cache stats`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonCacheStats {
    pub path: PathBuf,
    pub entries: usize,
    pub max_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_warning: Option<String>,
}

impl JsonCacheStats {
    #[must_use]
    pub fn new(cache: &PersistentCache, stats: &CacheStats) -> Self {
        Self {
            path: cache.path().to_path_buf(),
            entries: stats.entries,
            max_entries: stats.max_entries,
            load_warning: cache.load_warning().map(ToString::to_string),
        }
    }
}

/// Serialize `value` to `writer`, followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write, T: Serialize>(
    writer: &mut W,
    value: &T,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// Absolute path string where possible, the path as given otherwise.
fn normalize_path(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
