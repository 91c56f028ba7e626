//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Fingerprint every image below ~/Pictures and list the fingerprints
//! similar-images scan ~/Pictures
//!
//! # Find images that look like holiday.jpg, including rotated copies
//! similar-images find holiday.jpg ~/Pictures --threshold 85
//!
//! # Search by a fingerprint printed by an earlier scan
//! similar-images find 8f3c00ff12a4b7e1 ~/Pictures --output json
//!
//! # Inspect or reset the fingerprint cache
//! similar-images cache stats
//! similar-images cache clear
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::hash::Fingerprint;

/// Find visually similar images, even when rotated or mirrored.
///
/// Images are reduced to 64-bit perceptual fingerprints that are cached
/// between runs, so repeated searches over the same tree are fast.
#[derive(Debug, Parser)]
#[command(name = "similar-images")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors and results
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Read configuration from this TOML file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use this fingerprint cache instead of the configured one
    #[arg(long, global = true, value_name = "FILE", conflicts_with = "no_cache")]
    pub cache: Option<PathBuf>,

    /// Do not read or write the fingerprint cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Number of hashing worker threads (default: all cores)
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fingerprint every image in a directory tree
    Scan(ScanArgs),
    /// Find images similar to a needle image or fingerprint
    Find(FindArgs),
    /// Inspect or reset the fingerprint cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Traversal options shared by `scan` and `find`.
#[derive(Debug, Args, Default)]
pub struct WalkArgs {
    /// Glob patterns to ignore (can be specified multiple times)
    ///
    /// These patterns are added to the configured ones and to the root's
    /// .gitignore.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Only consider these extensions (comma separated or repeated)
    #[arg(long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Follow symbolic links during the walk
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Include hidden files and directories (starting with .)
    #[arg(long)]
    pub include_hidden: bool,

    /// Flush the cache after this many new fingerprints (0 = only at the end)
    #[arg(long, value_name = "N")]
    pub flush_every: Option<usize>,
}

impl WalkArgs {
    /// Apply these flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        config.ignore_patterns.extend(self.ignore_patterns.iter().cloned());
        if !self.extensions.is_empty() {
            config.extensions = self.extensions.clone();
        }
        if self.follow_symlinks {
            config.follow_symlinks = true;
        }
        if self.include_hidden {
            config.skip_hidden = false;
        }
        if let Some(every) = self.flush_every {
            config.flush_every = every;
        }
    }
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to fingerprint
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub walk: WalkArgs,
}

#[derive(Debug, Args)]
pub struct FindArgs {
    /// Image file or 16-digit hex fingerprint to search for
    #[arg(value_name = "NEEDLE", value_parser = parse_needle)]
    pub needle: Needle,

    /// Directory to search
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Minimum similarity in percent (default from config: 90)
    #[arg(short, long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub threshold: Option<u8>,

    /// Only match images in the same orientation
    #[arg(long)]
    pub no_symmetry: bool,

    /// Show at most this many matches
    #[arg(short, long, value_name = "N")]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub walk: WalkArgs,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show where the cache lives and how full it is
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// Remove every cached fingerprint
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// What `find` searches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Needle {
    /// An image to fingerprint first
    Image(PathBuf),
    /// A fingerprint given directly
    Fingerprint(Fingerprint),
}

/// Interpret a `find` needle.
///
/// Existing files always win; otherwise anything that parses as a hex
/// fingerprint is taken as one, and the rest as a (missing) image path.
pub fn parse_needle(s: &str) -> Result<Needle, String> {
    if s.trim().is_empty() {
        return Err("needle must not be empty".to_string());
    }
    let path = Path::new(s);
    if path.exists() {
        return Ok(Needle::Image(path.to_path_buf()));
    }
    match s.parse::<Fingerprint>() {
        Ok(fingerprint) => Ok(Needle::Fingerprint(fingerprint)),
        Err(_) => Ok(Needle::Image(path.to_path_buf())),
    }
}
