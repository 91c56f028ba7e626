//! Directory walker feeding the hashing workers.
//!
//! Uses [`jwalk`] so directory reads happen in parallel while the caller
//! consumes a plain iterator. Only the file type reported by the directory
//! listing is consulted here; metadata is fetched later by the worker that
//! hashes the file.
//!
//! # Example
//!
//! ```no_run
//! use similar_images::trawler::{ExtensionFilter, Walker, WalkerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let walker = Walker::new(
//!     Path::new("/home/user/Pictures"),
//!     WalkerConfig::default(),
//!     Arc::new(ExtensionFilter::default()),
//! );
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use thiserror::Error;

use super::FilePredicate;

/// Errors that can occur while walking below the root.
///
/// None of these abort a trawl: the affected entry is logged and skipped.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A directory below the root could not be listed.
    #[error("Cannot read directory {path}: {source}")]
    SubdirectoryUnreadable {
        /// Directory that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Any other traversal failure, such as a symlink loop.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::SubdirectoryUnreadable { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

/// Traversal options.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Follow symbolic links. Loops are detected and reported as errors.
    pub follow_symlinks: bool,

    /// Skip files and directories whose names start with `.`.
    pub skip_hidden: bool,

    /// Gitignore-style patterns, applied on top of the root's `.gitignore`.
    pub ignore_patterns: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            skip_hidden: true,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Lazy, interruptible directory walker.
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
    predicate: Arc<dyn FilePredicate>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .finish_non_exhaustive()
    }
}

impl Walker {
    #[must_use]
    pub fn new(root: &Path, config: WalkerConfig, predicate: Arc<dyn FilePredicate>) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            predicate,
            shutdown_flag: None,
        }
    }

    /// Stop yielding entries once `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the ignore matcher from the root `.gitignore` and configured patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Walk the tree, yielding every accepted image file.
    ///
    /// Errors are yielded as [`ScanError`] values rather than ending the walk.
    /// Ignored directories are pruned without being read. The iterator ends
    /// at the first entry after the shutdown flag is raised.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let gitignore = self.build_gitignore().map(Arc::new);
        let root = Arc::new(self.root.clone());

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                if let Some(gi) = &gitignore {
                    children.retain(|child| match child {
                        Ok(entry) => {
                            let ignored = is_ignored(
                                gi,
                                &root,
                                &entry.path(),
                                entry.file_type().is_dir(),
                            );
                            if ignored {
                                log::trace!("Ignoring {}", entry.path().display());
                            }
                            !ignored
                        }
                        Err(_) => true,
                    });
                }
                // Deterministic order within each directory.
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }
                    if !file_type.is_file() {
                        return None;
                    }

                    let path = entry.path();
                    if !self.predicate.accepts(&path) {
                        log::trace!("Skipping non-image file: {}", path.display());
                        return None;
                    }
                    Some(Ok(path))
                }
                Err(e) => Some(Err(self.handle_jwalk_error(e))),
            })
    }

    fn handle_jwalk_error(&self, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
        log::warn!("Walker error for {}: {}", path.display(), error);

        match error.io_error().map(std::io::Error::kind) {
            Some(kind) => ScanError::SubdirectoryUnreadable {
                path,
                source: std::io::Error::new(kind, error.to_string()),
            },
            None => ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            },
        }
    }
}

fn is_ignored(gitignore: &Gitignore, root: &Path, path: &Path, is_dir: bool) -> bool {
    // Matching expects paths relative to the root with forward slashes.
    let relative = path.strip_prefix(root).unwrap_or(path);
    let path_str = relative.to_string_lossy();
    let normalized = if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    };
    gitignore.matched(normalized, is_dir).is_ignore()
}
