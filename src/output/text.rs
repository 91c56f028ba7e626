//! Human-readable output.

use std::io::{self, Write};
use std::path::Path;

use crate::cache::CacheStats;
use crate::hash::{Fingerprint, Symmetry};
use crate::search::Match;
use crate::trawler::{ImageRecord, TrawlSummary};

/// One `<fingerprint>  <path>` line per image, in path order, then the summary.
pub fn write_scan<W: Write>(
    writer: &mut W,
    records: &[ImageRecord],
    summary: &TrawlSummary,
) -> io::Result<()> {
    let mut sorted: Vec<&ImageRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    for record in sorted {
        writeln!(writer, "{}  {}", record.fingerprint, record.path.display())?;
    }
    writeln!(writer)?;
    write_summary(writer, summary)
}

/// Ranked matches for a needle, best first.
pub fn write_matches<W: Write>(
    writer: &mut W,
    needle: Fingerprint,
    needle_path: Option<&Path>,
    min_similarity: u8,
    matches: &[Match],
    summary: &TrawlSummary,
) -> io::Result<()> {
    match needle_path {
        Some(path) => writeln!(writer, "Needle: {} ({})", path.display(), needle)?,
        None => writeln!(writer, "Needle: {}", needle)?,
    }

    if matches.is_empty() {
        writeln!(writer, "No images at least {}% similar.", min_similarity)?;
    } else {
        writeln!(
            writer,
            "{} image(s) at least {}% similar:",
            matches.len(),
            min_similarity
        )?;
        for m in matches {
            if m.symmetry == Symmetry::Identity {
                writeln!(writer, "  {:>3}%  {}", m.similarity, m.path.display())?;
            } else {
                writeln!(
                    writer,
                    "  {:>3}%  {}  ({})",
                    m.similarity,
                    m.path.display(),
                    m.symmetry
                )?;
            }
        }
    }
    writeln!(writer)?;
    write_summary(writer, summary)
}

pub fn write_summary<W: Write>(writer: &mut W, summary: &TrawlSummary) -> io::Result<()> {
    writeln!(
        writer,
        "Fingerprinted {} of {} images in {:.2?} ({} cached, {} computed)",
        summary.hashed(),
        summary.discovered,
        summary.duration,
        summary.cache_hits,
        summary.cache_misses
    )?;
    if summary.failed > 0 {
        writeln!(writer, "{} image(s) could not be read:", summary.failed)?;
        for issue in &summary.file_errors {
            writeln!(writer, "  {}: {}", issue.path.display(), issue.message)?;
        }
    }
    if !summary.walk_errors.is_empty() {
        writeln!(
            writer,
            "{} director(ies) could not be read:",
            summary.walk_errors.len()
        )?;
        for issue in &summary.walk_errors {
            writeln!(writer, "  {}", issue.message)?;
        }
    }
    if summary.interrupted {
        writeln!(writer, "Interrupted: {} queued image(s) skipped", summary.skipped)?;
    }
    Ok(())
}

pub fn write_cache_stats<W: Write>(
    writer: &mut W,
    path: &Path,
    stats: &CacheStats,
    load_warning: Option<&str>,
) -> io::Result<()> {
    writeln!(writer, "Cache:   {}", path.display())?;
    writeln!(writer, "Entries: {} / {}", stats.entries, stats.max_entries)?;
    if let Some(warning) = load_warning {
        writeln!(writer, "Warning: {}", warning)?;
    }
    Ok(())
}
