//! similar-images - find look-alike images
//!
//! Every image below a directory is reduced to a 64-bit perceptual
//! [`Fingerprint`](hash::Fingerprint) that survives resizing, recompression
//! and the eight rotations and mirror images of a square. Fingerprints are
//! memoized in a bounded, persistent LRU [`cache`], so repeated searches over
//! the same tree only decode what changed.
//!
//! The pieces, bottom up:
//!
//! - [`hash`]: the fingerprint engine and its symmetry group
//! - [`decode`]: image files to luminance sample grids
//! - [`cache`]: the persistent fingerprint cache
//! - [`trawler`]: concurrent directory walk plus worker pool
//! - [`search`]: similarity ranking over fingerprinted images
//! - [`cli`], [`config`], [`output`]: the command-line application

pub mod cache;
pub mod cli;
pub mod config;
pub mod decode;
pub mod error;
pub mod hash;
pub mod logging;
pub mod output;
pub mod progress;
pub mod search;
pub mod signal;
pub mod trawler;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::PersistentCache;
use crate::cli::{CacheCommand, Cli, Commands, FindArgs, Needle, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::decode::{Decoder, ImageDecoder};
use crate::error::ExitCode;
use crate::hash::{compute_fingerprint, Fingerprint};
use crate::output::{text, write_json, JsonCacheStats, JsonFindOutput, JsonScanOutput};
use crate::progress::Progress;
use crate::search::SimilarityIndex;
use crate::trawler::{TrawlOutcome, TrawlSummary, Trawler};

/// Run the application for parsed command-line arguments.
///
/// Results go to stdout; progress, logs and warnings go to stderr.
///
/// # Errors
///
/// Returns an error for unusable configuration, an unreadable search root or
/// needle image, and failures writing the output. Unreadable individual
/// images are not errors; they yield [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(path) = &cli.cache {
        config.cache_path = Some(path.clone());
    }
    log::debug!("Effective configuration: {:?}", config);

    match &cli.command {
        Commands::Scan(args) => {
            args.walk.apply(&mut config);
            config.validate()?;
            handle_scan(&cli, &config, args)
        }
        Commands::Find(args) => {
            args.walk.apply(&mut config);
            if let Some(threshold) = args.threshold {
                config.min_similarity = threshold;
            }
            if args.no_symmetry {
                config.consider_symmetry = false;
            }
            config.validate()?;
            handle_find(&cli, &config, args)
        }
        Commands::Cache(command) => handle_cache(&config, command),
    }
}

fn handle_scan(cli: &Cli, config: &Config, args: &ScanArgs) -> Result<ExitCode> {
    let outcome = trawl(cli, config, &args.path, args.output)?;
    let exit_code = exit_code_for(&outcome.summary, false);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Text => text::write_scan(&mut out, &outcome.records, &outcome.summary)?,
        OutputFormat::Json => write_json(
            &mut out,
            &JsonScanOutput::new(&outcome.records, &outcome.summary, exit_code),
            true,
        )?,
    }
    out.flush()?;
    Ok(exit_code)
}

fn handle_find(cli: &Cli, config: &Config, args: &FindArgs) -> Result<ExitCode> {
    let (needle, needle_path) = match &args.needle {
        Needle::Fingerprint(fingerprint) => (*fingerprint, None),
        Needle::Image(path) => (fingerprint_image(path)?, Some(path.as_path())),
    };
    log::debug!("Needle fingerprint: {}", needle);

    let outcome = trawl(cli, config, &args.path, args.output)?;

    let own_path = needle_path.and_then(|p| p.canonicalize().ok());
    let records = outcome.records.into_iter().filter(|record| {
        own_path.is_none() || record.path.canonicalize().ok() != own_path
    });
    let index = SimilarityIndex::from_records(records, config.consider_symmetry);
    let mut matches = index.find(needle, config.min_similarity);
    if let Some(limit) = args.limit {
        matches.truncate(limit);
    }

    let exit_code = exit_code_for(&outcome.summary, matches.is_empty());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Text => text::write_matches(
            &mut out,
            needle,
            needle_path,
            config.min_similarity,
            &matches,
            &outcome.summary,
        )?,
        OutputFormat::Json => write_json(
            &mut out,
            &JsonFindOutput::new(
                needle,
                needle_path,
                config.min_similarity,
                config.consider_symmetry,
                &matches,
                &outcome.summary,
                exit_code,
            ),
            true,
        )?,
    }
    out.flush()?;
    Ok(exit_code)
}

fn handle_cache(config: &Config, command: &CacheCommand) -> Result<ExitCode> {
    let path = cache_path(config)?;
    let cache = PersistentCache::open(&path, config.cache_max_entries);

    match command {
        CacheCommand::Stats { output } => {
            let stats = cache.stats();
            let stdout = io::stdout();
            let mut out = stdout.lock();
            match output {
                OutputFormat::Text => {
                    let warning = cache.load_warning().map(ToString::to_string);
                    text::write_cache_stats(&mut out, &path, &stats, warning.as_deref())?;
                }
                OutputFormat::Json => {
                    write_json(&mut out, &JsonCacheStats::new(&cache, &stats), true)?;
                }
            }
            out.flush()?;
        }
        CacheCommand::Clear => {
            let removed = cache.len();
            cache.clear();
            cache
                .flush()
                .with_context(|| format!("Failed to clear cache {}", path.display()))?;
            log::info!("Removed {} cached fingerprints from {}", removed, path.display());
        }
    }
    Ok(ExitCode::Success)
}

/// Fingerprint everything below `root`, using and then persisting the cache.
fn trawl(cli: &Cli, config: &Config, root: &Path, output: OutputFormat) -> Result<TrawlOutcome> {
    let handler = signal::install_handler()?;

    let mut trawler = Trawler::new(config.trawler_config(), ImageDecoder::new())
        .with_shutdown_flag(handler.get_flag());

    if !cli.no_cache {
        let path = cache_path(config)?;
        let cache = PersistentCache::open(&path, config.cache_max_entries);
        if let Some(warning) = cache.load_warning() {
            log::warn!("{}; starting with an empty cache", warning);
        }
        trawler = trawler.with_cache(Arc::new(cache));
    }

    let progress = Progress::new(cli.quiet || output == OutputFormat::Json);
    let outcome = trawler
        .start(root, &progress)
        .with_context(|| format!("Cannot search {}", root.display()))?;

    if let Some(cache) = trawler.cache() {
        if let Err(e) = cache.flush() {
            log::warn!("{}", e);
        }
    }
    Ok(outcome)
}

fn fingerprint_image(path: &Path) -> Result<Fingerprint> {
    let grid = ImageDecoder::new()
        .decode(path)
        .with_context(|| format!("Cannot read needle image {}", path.display()))?;
    let fingerprint = compute_fingerprint(&grid)
        .with_context(|| format!("Cannot fingerprint needle image {}", path.display()))?;
    Ok(fingerprint)
}

fn cache_path(config: &Config) -> Result<PathBuf> {
    config
        .resolved_cache_path()
        .context("No cache location available; pass --cache or --no-cache")
}

/// Interrupted beats no matches, which beats per-file failures.
fn exit_code_for(summary: &TrawlSummary, no_matches: bool) -> ExitCode {
    if summary.interrupted {
        ExitCode::Interrupted
    } else if no_matches {
        ExitCode::NoMatches
    } else if summary.has_errors() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}
