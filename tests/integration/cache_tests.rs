use similar_images::cache::{CacheError, CacheKey, PersistentCache};
use similar_images::hash::Fingerprint;
use std::fs;
use tempfile::tempdir;

fn key(name: &str) -> CacheKey {
    CacheKey::from_raw(name)
}

#[test]
fn test_flush_then_reopen_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");

    let cache = PersistentCache::open(&path, 10);
    cache.put(key("a"), Fingerprint::from_bits(1), 2);
    cache.put(key("b"), Fingerprint::from_bits(2), 2);
    cache.flush().unwrap();

    let reopened = PersistentCache::open(&path, 10);
    assert!(reopened.load_warning().is_none());
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.peek(&key("b")).unwrap().fingerprint, Fingerprint::from_bits(2));
    assert_eq!(reopened.keys(), vec![key("a"), key("b")]);
}

#[test]
fn test_corrupt_store_starts_empty_with_warning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");
    fs::write(&path, b"{ this is not a cache").unwrap();

    let cache = PersistentCache::open(&path, 10);
    assert!(cache.is_empty());
    assert!(matches!(
        cache.load_warning(),
        Some(CacheError::CorruptStore { .. })
    ));

    // The next flush replaces the broken file.
    cache.put(key("a"), Fingerprint::from_bits(9), 2);
    cache.flush().unwrap();
    let reopened = PersistentCache::open(&path, 10);
    assert!(reopened.load_warning().is_none());
    assert_eq!(reopened.len(), 1);
}

#[test]
fn test_tampered_store_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");

    let cache = PersistentCache::open(&path, 10);
    cache.put(key("a"), Fingerprint::from_bits(20_015_998_343_868), 2);
    cache.flush().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let tampered = content.replace("20015998343868", "20015998343869");
    assert_ne!(content, tampered);
    fs::write(&path, tampered).unwrap();

    let reopened = PersistentCache::open(&path, 10);
    assert!(reopened.is_empty());
    assert!(reopened.load_warning().is_some());
}

#[test]
fn test_clear_without_flush_keeps_disk_copy() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");

    let cache = PersistentCache::open(&path, 10);
    cache.put(key("a"), Fingerprint::from_bits(1), 2);
    cache.flush().unwrap();

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(PersistentCache::open(&path, 10).len(), 1);

    cache.flush().unwrap();
    assert!(PersistentCache::open(&path, 10).is_empty());
}

#[test]
fn test_failed_save_leaves_previous_file_intact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"file").unwrap();

    let cache = PersistentCache::open(&path, 10);
    cache.put(key("a"), Fingerprint::from_bits(1), 2);
    cache.flush().unwrap();
    let before = fs::read(&path).unwrap();

    cache.put(key("b"), Fingerprint::from_bits(2), 2);
    let result = cache.save_as(&blocker.join("fingerprints.json"));
    assert!(matches!(result, Err(CacheError::Io { .. })));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_eviction_survives_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fingerprints.json");

    let cache = PersistentCache::open(&path, 2);
    cache.put(key("a"), Fingerprint::from_bits(1), 2);
    cache.put(key("b"), Fingerprint::from_bits(2), 2);
    assert!(cache.get(&key("a")).is_some());
    cache.put(key("c"), Fingerprint::from_bits(3), 2);
    cache.flush().unwrap();

    let reopened = PersistentCache::open(&path, 2);
    assert_eq!(reopened.keys(), vec![key("a"), key("c")]);
    assert_eq!(cache.stats().evictions, 1);
}
