use clap::Parser;
use image::{GrayImage, Luma};
use similar_images::cache::PersistentCache;
use similar_images::cli::Cli;
use similar_images::error::ExitCode;
use similar_images::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// A flat image sets every fingerprint bit.
fn write_flat(path: &Path) {
    GrayImage::from_pixel(32, 32, Luma([128])).save(path).unwrap();
}

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["similar-images", "-q"];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_scan_success_and_partial_success() {
    let photos = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache = state.path().join("fingerprints.json");
    write_flat(&photos.path().join("a.png"));

    let code = run(&[
        "--cache",
        cache.to_str().unwrap(),
        "scan",
        photos.path().to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert_eq!(PersistentCache::open(&cache, 10).len(), 1);

    fs::write(photos.path().join("broken.png"), b"nope").unwrap();
    let code = run(&[
        "--cache",
        cache.to_str().unwrap(),
        "scan",
        photos.path().to_str().unwrap(),
        "--output",
        "json",
    ])
    .unwrap();
    assert_eq!(code, ExitCode::PartialSuccess);
}

#[test]
fn test_scan_without_cache() {
    let photos = tempdir().unwrap();
    write_flat(&photos.path().join("a.png"));

    let code = run(&["--no-cache", "scan", photos.path().to_str().unwrap()]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_find_by_fingerprint() {
    let photos = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache = state.path().join("fingerprints.json");
    write_flat(&photos.path().join("gray.png"));
    let root = photos.path().to_str().unwrap();
    let cache = cache.to_str().unwrap();

    let code = run(&["--cache", cache, "find", "ffffffffffffffff", root, "-t", "100"]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let code = run(&["--cache", cache, "find", "0000000000000000", root, "-t", "50"]).unwrap();
    assert_eq!(code, ExitCode::NoMatches);
}

#[test]
fn test_find_by_image_excludes_the_needle_itself() {
    let photos = tempdir().unwrap();
    let needle = photos.path().join("needle.png");
    write_flat(&needle);
    let root = photos.path().to_str().unwrap();

    let code = run(&["--no-cache", "find", needle.to_str().unwrap(), root]).unwrap();
    assert_eq!(code, ExitCode::NoMatches);

    write_flat(&photos.path().join("copy.png"));
    let code = run(&["--no-cache", "find", needle.to_str().unwrap(), root]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_missing_needle_image_is_an_error() {
    let photos = tempdir().unwrap();
    let missing = photos.path().join("missing.png");
    let result = run(&[
        "--no-cache",
        "find",
        missing.to_str().unwrap(),
        photos.path().to_str().unwrap(),
    ]);
    assert!(result.is_err());
}

#[test]
fn test_missing_root_is_an_error() {
    let photos = tempdir().unwrap();
    let missing = photos.path().join("missing");
    let result = run(&["--no-cache", "scan", missing.to_str().unwrap()]);
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("Cannot search"));
}

#[test]
fn test_cache_stats_and_clear() {
    let photos = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache = state.path().join("fingerprints.json");
    write_flat(&photos.path().join("a.png"));
    let cache_arg = cache.to_str().unwrap();

    run(&["--cache", cache_arg, "scan", photos.path().to_str().unwrap()]).unwrap();
    assert_eq!(PersistentCache::open(&cache, 10).len(), 1);

    let code = run(&["--cache", cache_arg, "cache", "stats", "-o", "json"]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let code = run(&["--cache", cache_arg, "cache", "clear"]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(PersistentCache::open(&cache, 10).is_empty());
}
