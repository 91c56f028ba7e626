//! Progress reporting for trawls.
//!
//! The trawler reports through the [`ProgressSink`] trait. [`Progress`] draws
//! an indicatif bar in the terminal; [`NoProgress`] discards everything.
//! Any `Fn(&ProgressSnapshot)` closure is also a sink, which is handy in tests.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::trawler::{ProgressSnapshot, TrawlSummary};

/// Receiver of trawl progress.
///
/// Methods are called from worker threads, possibly concurrently, and should
/// return quickly. Each snapshot is internally consistent, but snapshots from
/// different workers may arrive out of order.
pub trait ProgressSink: Send + Sync {
    /// A file finished processing (hashed, failed or skipped).
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// The walker accepted a new file. Always called from the walking thread.
    fn on_discovered(&self, _snapshot: &ProgressSnapshot) {}

    /// The trawl is over.
    fn on_finished(&self, _summary: &TrawlSummary) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot);
    }
}

/// Sink that ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Terminal progress bar using indicatif.
///
/// The bar length follows the number of discovered files, so it grows while
/// the walk is still running.
#[derive(Debug)]
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Examples
    ///
    /// ```
    /// use similar_images::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_style(Self::style());
        bar.set_message("Searching");
        Self { bar }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }
}

impl ProgressSink for Progress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.bar
            .set_position((snapshot.completed + snapshot.skipped) as u64);
        if let Some(record) = &snapshot.latest {
            self.bar
                .set_message(truncate_path(&record.path.to_string_lossy(), 30));
        }
    }

    // Only the walker thread reports discoveries, so the length never shrinks.
    fn on_discovered(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_length(snapshot.discovered as u64);
    }

    fn on_finished(&self, summary: &TrawlSummary) {
        let message = if summary.interrupted {
            format!("Interrupted after {} images", summary.hashed())
        } else {
            format!("{} images fingerprinted", summary.hashed())
        };
        self.bar.finish_with_message(message);
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_chars: usize) -> String {
    if path.chars().count() <= max_chars {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_chars {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_chars.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
