//! Shared per-trawl state.
//!
//! Every counter and the result list live behind one mutex, so a worker's
//! update and the snapshot it reports are taken in a single critical section.
//! Observers can never see `pending` decremented without the matching
//! `completed` increment.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::walker::ScanError;
use super::{FileError, ImageRecord};

/// Point-in-time view of a trawl's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Files accepted by the walker so far
    pub discovered: usize,
    /// Files discovered but not yet finished
    pub pending: usize,
    /// Files finished, successfully or not
    pub completed: usize,
    /// Completed files that could not be fingerprinted
    pub failed: usize,
    /// Files dropped from the queue after a stop request
    pub skipped: usize,
    /// Record produced by the update that took this snapshot, if any
    pub latest: Option<ImageRecord>,
}

/// A non-fatal problem recorded during a trawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrawlIssue {
    pub path: PathBuf,
    pub message: String,
}

/// Final accounting of a trawl.
#[derive(Debug, Clone, Serialize)]
pub struct TrawlSummary {
    /// Directory that was trawled
    pub root: PathBuf,
    pub discovered: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Whether the trawl was stopped before the walk finished
    pub interrupted: bool,
    /// Wall-clock time of the trawl
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Files that could not be fingerprinted
    pub file_errors: Vec<TrawlIssue>,
    /// Entries the walker could not read
    pub walk_errors: Vec<TrawlIssue>,
}

impl TrawlSummary {
    /// Number of files that produced a record.
    pub fn hashed(&self) -> usize {
        self.completed - self.failed
    }

    pub fn has_errors(&self) -> bool {
        !self.file_errors.is_empty() || !self.walk_errors.is_empty()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// How the cache took part in handling one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheLookup {
    Hit,
    Miss,
    /// No cache configured, or the file failed before the lookup.
    Bypassed,
}

#[derive(Debug, Default)]
struct SessionState {
    discovered: usize,
    pending: usize,
    completed: usize,
    failed: usize,
    skipped: usize,
    cache_hits: usize,
    cache_misses: usize,
    records: Vec<ImageRecord>,
    file_errors: Vec<TrawlIssue>,
    walk_errors: Vec<TrawlIssue>,
}

impl SessionState {
    fn snapshot(&self, latest: Option<ImageRecord>) -> ProgressSnapshot {
        ProgressSnapshot {
            discovered: self.discovered,
            pending: self.pending,
            completed: self.completed,
            failed: self.failed,
            skipped: self.skipped,
            latest,
        }
    }

    fn count_lookup(&mut self, lookup: CacheLookup) {
        match lookup {
            CacheLookup::Hit => self.cache_hits += 1,
            CacheLookup::Miss => self.cache_misses += 1,
            CacheLookup::Bypassed => {}
        }
    }

    fn finish_one(&mut self) {
        debug_assert!(self.pending > 0, "finished more files than were discovered");
        self.pending = self.pending.saturating_sub(1);
    }
}

/// The synchronized aggregate shared by the walker and all workers.
#[derive(Debug)]
pub(crate) struct TrawlSession {
    root: PathBuf,
    state: Mutex<SessionState>,
}

impl TrawlSession {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A file was accepted by the walker and is about to be queued.
    pub(crate) fn file_discovered(&self) -> ProgressSnapshot {
        let mut state = self.lock();
        state.discovered += 1;
        state.pending += 1;
        state.snapshot(None)
    }

    pub(crate) fn file_hashed(&self, record: ImageRecord, lookup: CacheLookup) -> ProgressSnapshot {
        let mut state = self.lock();
        state.finish_one();
        state.completed += 1;
        state.count_lookup(lookup);
        state.records.push(record.clone());
        state.snapshot(Some(record))
    }

    pub(crate) fn file_failed(
        &self,
        path: &Path,
        error: &FileError,
        lookup: CacheLookup,
    ) -> ProgressSnapshot {
        let mut state = self.lock();
        state.finish_one();
        state.completed += 1;
        state.failed += 1;
        state.count_lookup(lookup);
        state.file_errors.push(TrawlIssue {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
        state.snapshot(None)
    }

    /// A queued file was dropped because the trawl is stopping.
    pub(crate) fn file_skipped(&self) -> ProgressSnapshot {
        let mut state = self.lock();
        state.finish_one();
        state.skipped += 1;
        state.snapshot(None)
    }

    pub(crate) fn walk_error(&self, error: &ScanError) {
        self.lock().walk_errors.push(TrawlIssue {
            path: error.path().to_path_buf(),
            message: error.to_string(),
        });
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot(None)
    }

    /// Consume the session, returning the records and the summary.
    pub(crate) fn finish(self, interrupted: bool, duration: Duration) -> (Vec<ImageRecord>, TrawlSummary) {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let summary = TrawlSummary {
            root: self.root,
            discovered: state.discovered,
            completed: state.completed,
            failed: state.failed,
            skipped: state.skipped,
            cache_hits: state.cache_hits,
            cache_misses: state.cache_misses,
            interrupted,
            duration,
            file_errors: state.file_errors,
            walk_errors: state.walk_errors,
        };
        (state.records, summary)
    }
}
