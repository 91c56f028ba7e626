use filetime::{set_file_mtime, FileTime};
use image::{imageops, GrayImage, Luma};
use similar_images::cache::PersistentCache;
use similar_images::decode::ImageDecoder;
use similar_images::progress::NoProgress;
use similar_images::trawler::{
    ProgressSnapshot, TrawlError, TrawlState, Trawler, TrawlerConfig,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// 90x90 image made of 10x10 blocks with distinct, uneven brightness.
fn pattern(seed: u32) -> GrayImage {
    GrayImage::from_fn(90, 90, |x, y| {
        let (bx, by) = (x / 10, y / 10);
        let v = (bx * 37 + by * 91 + bx * by * 13 + seed * 53) % 220 + 16;
        Luma([v as u8])
    })
}

fn write_png(path: &Path, image: &GrayImage) {
    image.save(path).unwrap();
}

fn trawler(config: TrawlerConfig) -> Trawler {
    Trawler::new(config.with_workers(2), ImageDecoder::new())
}

#[test]
fn test_trawl_fingerprints_images_and_reports_failures() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("a.png"), &pattern(1));
    fs::create_dir(dir.path().join("nested")).unwrap();
    write_png(&dir.path().join("nested").join("b.png"), &pattern(2));
    fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let trawler = trawler(TrawlerConfig::default());
    let outcome = trawler.start(dir.path(), &NoProgress).unwrap();

    assert_eq!(trawler.state(), TrawlState::Done);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.summary.discovered, 3);
    assert_eq!(outcome.summary.completed, 3);
    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(outcome.summary.hashed(), 2);
    assert!(!outcome.summary.interrupted);
    assert!(outcome.summary.has_errors());
    assert!(outcome.summary.file_errors[0].path.ends_with("broken.png"));
}

#[test]
fn test_progress_reaches_total() {
    let dir = tempdir().unwrap();
    for i in 0..6 {
        write_png(&dir.path().join(format!("{i}.png")), &pattern(i));
    }

    let seen: Mutex<Vec<ProgressSnapshot>> = Mutex::new(Vec::new());
    let sink = |snapshot: &ProgressSnapshot| seen.lock().unwrap().push(snapshot.clone());
    let outcome = trawler(TrawlerConfig::default())
        .start(dir.path(), &sink)
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 6);
    assert!(seen.iter().all(|s| s.completed <= s.discovered));
    assert_eq!(seen.iter().map(|s| s.completed).max(), Some(6));
    assert_eq!(outcome.summary.completed, 6);
}

#[test]
fn test_rescan_is_served_from_cache() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_png(&dir.path().join("a.png"), &pattern(1));
    write_png(&dir.path().join("b.png"), &pattern(2));

    let cache = Arc::new(PersistentCache::open(
        cache_dir.path().join("fingerprints.json"),
        100,
    ));
    let trawler = trawler(TrawlerConfig::default()).with_cache(Arc::clone(&cache));

    let first = trawler.start(dir.path(), &NoProgress).unwrap();
    assert_eq!(first.summary.cache_hits, 0);
    assert_eq!(first.summary.cache_misses, 2);
    assert_eq!(cache.len(), 2);

    let second = trawler.start(dir.path(), &NoProgress).unwrap();
    assert_eq!(second.summary.cache_hits, 2);
    assert_eq!(second.summary.cache_misses, 0);

    let mut a: Vec<_> = first.records.iter().map(|r| (r.path.clone(), r.fingerprint)).collect();
    let mut b: Vec<_> = second.records.iter().map(|r| (r.path.clone(), r.fingerprint)).collect();
    a.sort_by(|x, y| x.0.cmp(&y.0));
    b.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(a, b);
}

#[test]
fn test_modified_file_is_a_cache_miss() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let path = dir.path().join("a.png");
    write_png(&path, &pattern(1));
    write_png(&dir.path().join("b.png"), &pattern(2));

    let cache = Arc::new(PersistentCache::open(
        cache_dir.path().join("fingerprints.json"),
        100,
    ));
    let trawler = trawler(TrawlerConfig::default()).with_cache(cache);
    trawler.start(dir.path(), &NoProgress).unwrap();

    set_file_mtime(&path, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

    let outcome = trawler.start(dir.path(), &NoProgress).unwrap();
    assert_eq!(outcome.summary.cache_hits, 1);
    assert_eq!(outcome.summary.cache_misses, 1);
}

#[test]
fn test_cache_persists_across_processes() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("fingerprints.json");
    write_png(&dir.path().join("a.png"), &pattern(3));

    let cache = Arc::new(PersistentCache::open(&cache_path, 100));
    trawler(TrawlerConfig::default())
        .with_cache(Arc::clone(&cache))
        .start(dir.path(), &NoProgress)
        .unwrap();
    cache.flush().unwrap();

    let reopened = Arc::new(PersistentCache::open(&cache_path, 100));
    let outcome = trawler(TrawlerConfig::default())
        .with_cache(reopened)
        .start(dir.path(), &NoProgress)
        .unwrap();
    assert_eq!(outcome.summary.cache_hits, 1);
}

#[test]
fn test_periodic_flush_writes_store() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("fingerprints.json");
    for i in 0..3 {
        write_png(&dir.path().join(format!("{i}.png")), &pattern(i));
    }

    let cache = Arc::new(PersistentCache::open(&cache_path, 100));
    trawler(TrawlerConfig::default().with_flush_every(Some(1)))
        .with_cache(cache)
        .start(dir.path(), &NoProgress)
        .unwrap();

    // No explicit flush: the store on disk comes from the periodic flushes.
    assert!(cache_path.exists());
    assert!(!PersistentCache::open(&cache_path, 100).is_empty());
}

#[test]
fn test_stop_before_start_yields_interrupted_outcome() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("a.png"), &pattern(1));

    let trawler = trawler(TrawlerConfig::default());
    trawler.stop();
    let outcome = trawler.start(dir.path(), &NoProgress).unwrap();

    assert!(outcome.summary.interrupted);
    assert!(outcome.records.is_empty());
    assert_eq!(trawler.state(), TrawlState::Done);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempdir().unwrap();
    let trawler = trawler(TrawlerConfig::default());
    let result = trawler.start(&dir.path().join("missing"), &NoProgress);

    assert!(matches!(result, Err(TrawlError::RootUnreadable { .. })));
    assert_eq!(trawler.state(), TrawlState::Failed);
}

#[test]
fn test_rotated_and_mirrored_copies_fingerprint_alike() {
    use similar_images::hash::similarity;

    let dir = tempdir().unwrap();
    let original = pattern(4);
    write_png(&dir.path().join("original.png"), &original);
    write_png(&dir.path().join("rotated.png"), &imageops::rotate90(&original));
    write_png(&dir.path().join("mirrored.png"), &imageops::flip_horizontal(&original));

    let outcome = trawler(TrawlerConfig::default())
        .start(dir.path(), &NoProgress)
        .unwrap();
    let find = |name: &str| {
        outcome
            .records
            .iter()
            .find(|r| r.path.ends_with(name))
            .unwrap()
            .fingerprint
    };

    let original = find("original.png");
    assert!(similarity(original, find("rotated.png"), true) >= 95);
    assert!(similarity(original, find("mirrored.png"), true) >= 95);
}

#[test]
fn test_identical_copies_fingerprint_equal() {
    use similar_images::hash::similarity;

    let dir = tempdir().unwrap();
    let a = dir.path().join("a.png");
    write_png(&a, &pattern(5));
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::copy(&a, dir.path().join("nested").join("b.png")).unwrap();

    let outcome = trawler(TrawlerConfig::default())
        .start(dir.path(), &NoProgress)
        .unwrap();
    assert_eq!(outcome.records.len(), 2);

    let a = outcome.records[0].fingerprint;
    let b = outcome.records[1].fingerprint;
    assert_eq!(a, b);
    assert_eq!(similarity(a, b, false), 100);
}
