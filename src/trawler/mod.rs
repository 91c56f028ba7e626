//! Concurrent fingerprinting of a directory tree.
//!
//! A [`Trawler`] walks a root directory on the calling thread and feeds every
//! accepted image path into a bounded queue drained by a rayon worker pool.
//! Each worker derives the file's [`CacheKey`], consults the optional
//! [`PersistentCache`], and on a miss decodes and fingerprints the file.
//!
//! # Lifecycle
//!
//! `Idle -> Searching -> Processing -> Draining -> Done`, or `Failed` when the
//! root cannot be read. Per-file failures never abort a trawl.
//!
//! # Cancellation
//!
//! [`Trawler::stop`] sets a shared flag. The walk ends at the next entry,
//! files already being decoded finish normally, and files still queued are
//! counted as skipped. The trawl then ends in `Done` with partial results.
//!
//! # Example
//!
//! ```no_run
//! use similar_images::decode::ImageDecoder;
//! use similar_images::progress::NoProgress;
//! use similar_images::trawler::{Trawler, TrawlerConfig};
//! use std::path::Path;
//!
//! let trawler = Trawler::new(TrawlerConfig::default(), ImageDecoder::new());
//! let outcome = trawler.start(Path::new("/home/user/Pictures"), &NoProgress).unwrap();
//! println!("{} images", outcome.records.len());
//! ```

pub mod session;
pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheKey, PersistentCache};
use crate::decode::{DecodeError, Decoder};
use crate::hash::{compute_fingerprint, Fingerprint, HashError, ALGORITHM_VERSION};
use crate::progress::ProgressSink;

use session::{CacheLookup, TrawlSession};

pub use session::{ProgressSnapshot, TrawlIssue, TrawlSummary};
pub use walker::{ScanError, Walker, WalkerConfig};

/// Extensions accepted by the default [`ExtensionFilter`].
#[cfg(feature = "jpeg")]
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

/// Extensions accepted by the default [`ExtensionFilter`].
///
/// JPEG files are only accepted when built with the `jpeg` feature.
#[cfg(not(feature = "jpeg"))]
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "png", "tif", "tiff", "webp"];

/// A fingerprinted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Location of the image
    pub path: PathBuf,
    /// Its fingerprint
    pub fingerprint: Fingerprint,
    /// Algorithm version that produced the fingerprint
    pub version: u32,
}

/// Errors that end a trawl.
#[derive(Debug, Error)]
pub enum TrawlError {
    /// The root is missing, not a directory, or cannot be listed.
    #[error("Cannot read root directory {path}: {source}")]
    RootUnreadable {
        /// Root that was requested
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be created.
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors affecting a single file. These are recorded, never fatal.
#[derive(Debug, Error)]
pub enum FileError {
    /// The image could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The decoder produced a grid the fingerprint engine rejected.
    #[error("Failed to fingerprint {path}: {source}")]
    Compute {
        /// File being fingerprinted
        path: PathBuf,
        /// The engine's complaint
        #[source]
        source: HashError,
    },

    /// The file's metadata could not be read.
    #[error("Cannot read metadata for {path}: {source}")]
    Metadata {
        /// File being inspected
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Decides which discovered files are worth decoding.
pub trait FilePredicate: Send + Sync {
    fn accepts(&self, path: &Path) -> bool;
}

impl<F> FilePredicate for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accepts(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Accepts files by case-insensitive extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Accept the given extensions. A leading `.` is ignored.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        extensions.sort();
        extensions.dedup();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(IMAGE_EXTENSIONS)
    }
}

impl FilePredicate for ExtensionFilter {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                let e = e.to_lowercase();
                self.extensions.iter().any(|known| *known == e)
            })
    }
}

/// Trawl configuration.
#[derive(Clone)]
pub struct TrawlerConfig {
    /// Worker threads; `0` uses the available parallelism.
    pub workers: usize,
    /// Queue capacity between walker and workers; defaults to `workers * 4`.
    pub queue_capacity: Option<usize>,
    /// Only cached fingerprints with this version are reused.
    pub algorithm_version: u32,
    /// Traversal options.
    pub walker: WalkerConfig,
    /// Flush the cache after this many freshly computed fingerprints.
    pub flush_every: Option<usize>,
    /// Which files to fingerprint.
    pub predicate: Arc<dyn FilePredicate>,
}

impl std::fmt::Debug for TrawlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrawlerConfig")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("algorithm_version", &self.algorithm_version)
            .field("walker", &self.walker)
            .field("flush_every", &self.flush_every)
            .field("predicate", &"<predicate>")
            .finish()
    }
}

impl Default for TrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: None,
            algorithm_version: ALGORITHM_VERSION,
            walker: WalkerConfig::default(),
            flush_every: None,
            predicate: Arc::new(ExtensionFilter::default()),
        }
    }
}

impl TrawlerConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    #[must_use]
    pub fn with_algorithm_version(mut self, version: u32) -> Self {
        self.algorithm_version = version;
        self
    }

    #[must_use]
    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    #[must_use]
    pub fn with_flush_every(mut self, every: Option<usize>) -> Self {
        self.flush_every = every.filter(|&n| n > 0);
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: impl FilePredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Number of worker threads actually started.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        }
    }

    fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.effective_workers() * 4)
            .max(1)
    }
}

/// Where a trawl is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrawlState {
    Idle,
    Searching,
    Processing,
    Draining,
    Done,
    Failed,
}

/// Everything a finished trawl produced.
#[derive(Debug, Clone)]
pub struct TrawlOutcome {
    /// One record per successfully fingerprinted file, in completion order
    pub records: Vec<ImageRecord>,
    pub summary: TrawlSummary,
}

/// Fingerprints every image below a root directory.
pub struct Trawler {
    config: TrawlerConfig,
    decoder: Arc<dyn Decoder>,
    cache: Option<Arc<PersistentCache>>,
    stop: Arc<AtomicBool>,
    state: Mutex<TrawlState>,
}

impl std::fmt::Debug for Trawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trawler")
            .field("config", &self.config)
            .field("cache", &self.cache.as_ref().map(|c| c.path().to_path_buf()))
            .field("stop", &self.stop)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Trawler {
    #[must_use]
    pub fn new(config: TrawlerConfig, decoder: impl Decoder + 'static) -> Self {
        Self {
            config,
            decoder: Arc::new(decoder),
            cache: None,
            stop: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(TrawlState::Idle),
        }
    }

    /// Memoize fingerprints in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<PersistentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share a stop flag with another owner, such as a Ctrl+C handler.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = flag;
        self
    }

    /// Request cooperative cancellation of the running trawl.
    ///
    /// The flag is never cleared by the trawler, so stopping before
    /// [`start`](Self::start) makes the next trawl end immediately.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TrawlState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TrawlState) {
        log::trace!("Trawl state: {:?}", state);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn cache(&self) -> Option<&Arc<PersistentCache>> {
        self.cache.as_ref()
    }

    /// Fingerprint every accepted file below `root`.
    ///
    /// Blocks until the walk has ended and every queued file is finished.
    ///
    /// # Errors
    ///
    /// Returns [`TrawlError::RootUnreadable`] if `root` is missing, not a
    /// directory, or cannot be listed. Problems with individual files or
    /// subdirectories are reported in the summary instead.
    pub fn start(&self, root: &Path, sink: &dyn ProgressSink) -> Result<TrawlOutcome, TrawlError> {
        let started = Instant::now();
        self.set_state(TrawlState::Searching);

        if let Err(e) = validate_root(root) {
            log::error!("{}", e);
            self.set_state(TrawlState::Failed);
            return Err(e);
        }

        let workers = self.config.effective_workers();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("trawl-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                self.set_state(TrawlState::Failed);
                return Err(e.into());
            }
        };

        log::info!(
            "Trawling {} with {} workers{}",
            root.display(),
            workers,
            if self.cache.is_some() { "" } else { " (no cache)" }
        );

        let session = TrawlSession::new(root);
        let fresh = AtomicUsize::new(0);
        let (tx, rx) = crossbeam_channel::bounded::<PathBuf>(self.config.effective_queue_capacity());
        let walker = Walker::new(
            root,
            self.config.walker.clone(),
            Arc::clone(&self.config.predicate),
        )
        .with_shutdown_flag(Arc::clone(&self.stop));

        pool.in_place_scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let session = &session;
                let fresh = &fresh;
                scope.spawn(move |_| self.worker_loop(rx, session, sink, fresh));
            }
            drop(rx);
            self.set_state(TrawlState::Processing);

            for item in walker.walk() {
                match item {
                    Ok(path) => {
                        let snapshot = session.file_discovered();
                        sink.on_discovered(&snapshot);
                        if tx.send(path).is_err() {
                            break;
                        }
                    }
                    Err(e) => session.walk_error(&e),
                }
            }

            // Closing the queue lets workers exit once it is empty.
            drop(tx);
            self.set_state(TrawlState::Draining);
            log::debug!("Walk finished, {} files pending", session.snapshot().pending);
        });

        let interrupted = self.is_stop_requested();
        let (records, summary) = session.finish(interrupted, started.elapsed());
        self.set_state(TrawlState::Done);

        if interrupted {
            log::info!(
                "Trawl interrupted: {} images fingerprinted, {} skipped",
                summary.hashed(),
                summary.skipped
            );
        } else {
            log::info!(
                "Trawl complete: {} images fingerprinted, {} failed, {} cache hits in {:.2?}",
                summary.hashed(),
                summary.failed,
                summary.cache_hits,
                summary.duration
            );
        }
        sink.on_finished(&summary);

        Ok(TrawlOutcome { records, summary })
    }

    fn worker_loop(
        &self,
        rx: Receiver<PathBuf>,
        session: &TrawlSession,
        sink: &dyn ProgressSink,
        fresh: &AtomicUsize,
    ) {
        for path in rx.iter() {
            let snapshot = if self.is_stop_requested() {
                log::trace!("Skipping {} after stop request", path.display());
                session.file_skipped()
            } else {
                let (result, lookup) = self.process_file(&path, fresh);
                match result {
                    Ok(record) => session.file_hashed(record, lookup),
                    Err(e) => {
                        log::warn!("Skipping {}: {}", path.display(), e);
                        session.file_failed(&path, &e, lookup)
                    }
                }
            };
            sink.on_progress(&snapshot);
        }
    }

    /// Fingerprint one file, consulting the cache first.
    fn process_file(
        &self,
        path: &Path,
        fresh: &AtomicUsize,
    ) -> (Result<ImageRecord, FileError>, CacheLookup) {
        let version = self.config.algorithm_version;
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(source) => {
                let error = FileError::Metadata {
                    path: path.to_path_buf(),
                    source,
                };
                return (Err(error), CacheLookup::Bypassed);
            }
        };
        let key = CacheKey::from_metadata(path, &metadata);

        let lookup = match &self.cache {
            Some(cache) => match cache.get(&key) {
                Some(entry) if entry.version == version => {
                    log::trace!("Cache hit: {}", path.display());
                    let record = ImageRecord {
                        path: path.to_path_buf(),
                        fingerprint: entry.fingerprint,
                        version,
                    };
                    return (Ok(record), CacheLookup::Hit);
                }
                Some(entry) => {
                    log::debug!(
                        "Ignoring cached fingerprint for {} from algorithm version {}",
                        path.display(),
                        entry.version
                    );
                    CacheLookup::Miss
                }
                None => CacheLookup::Miss,
            },
            None => CacheLookup::Bypassed,
        };

        let fingerprint = match self.fingerprint(path) {
            Ok(f) => f,
            Err(e) => return (Err(e), lookup),
        };

        if let Some(cache) = &self.cache {
            cache.put(key, fingerprint, version);
            let computed = fresh.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(every) = self.config.flush_every {
                if computed % every == 0 {
                    log::debug!("Flushing cache after {} new fingerprints", computed);
                    if let Err(e) = cache.flush() {
                        log::warn!("Periodic cache flush failed: {}", e);
                    }
                }
            }
        }

        let record = ImageRecord {
            path: path.to_path_buf(),
            fingerprint,
            version,
        };
        (Ok(record), lookup)
    }

    /// Decode and fingerprint without touching the cache.
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint, FileError> {
        let grid = self.decoder.decode(path)?;
        compute_fingerprint(&grid).map_err(|source| FileError::Compute {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn validate_root(root: &Path) -> Result<(), TrawlError> {
    let unreadable = |source: std::io::Error| TrawlError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(root).map_err(unreadable)?;
    if !metadata.is_dir() {
        return Err(unreadable(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    std::fs::read_dir(root).map_err(unreadable)?;
    Ok(())
}
