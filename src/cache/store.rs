//! Bounded, thread-safe fingerprint cache with LRU eviction.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{persist, CacheEntry, CacheError, CacheKey, CacheResult};
use crate::hash::Fingerprint;

#[derive(Debug, Clone, Copy)]
struct Slot {
    fingerprint: Fingerprint,
    version: u32,
    last_used: u64,
}

/// Entries plus a recency index ordered by tick.
#[derive(Debug, Default)]
struct Store {
    entries: HashMap<CacheKey, Slot>,
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
}

impl Store {
    fn from_entries(mut loaded: Vec<CacheEntry>) -> Self {
        // Renumber ticks densely, keeping the saved recency order.
        loaded.sort_by_key(|e| e.last_used);
        let mut store = Store::default();
        for entry in loaded {
            store.tick += 1;
            let tick = store.tick;
            if let Some(old) = store.entries.insert(
                entry.key.clone(),
                Slot {
                    fingerprint: entry.fingerprint,
                    version: entry.version,
                    last_used: tick,
                },
            ) {
                store.recency.remove(&old.last_used);
            }
            store.recency.insert(tick, entry.key);
        }
        store
    }

    /// Drop least recently used entries until at most `max` remain.
    fn evict_to(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max {
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };
            log::trace!("Evicting cache entry {}", key);
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    fn entry(key: &CacheKey, slot: &Slot) -> CacheEntry {
        CacheEntry {
            key: key.clone(),
            fingerprint: slot.fingerprint,
            version: slot.version,
            last_used: slot.last_used,
        }
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held
    pub entries: usize,
    /// Configured capacity
    pub max_entries: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped to respect the capacity
    pub evictions: u64,
}

/// Durable, size-bounded memoization of fingerprints keyed by file identity.
///
/// All lookups and updates go through one mutex. [`flush`](Self::flush) only
/// holds that mutex while copying a snapshot; serialization and disk I/O happen
/// afterwards, so hashing workers are never stalled by disk latency.
///
/// # Example
///
/// ```no_run
/// use similar_images::cache::{CacheKey, PersistentCache};
/// use similar_images::hash::{Fingerprint, ALGORITHM_VERSION};
/// use std::path::Path;
/// use std::time::SystemTime;
///
/// let cache = PersistentCache::open("/tmp/fingerprints.json", 10_000);
/// let key = CacheKey::for_file(Path::new("/photos/a.jpg"), 1234, SystemTime::now());
/// cache.put(key.clone(), Fingerprint::from_bits(42), ALGORITHM_VERSION);
/// assert!(cache.get(&key).is_some());
/// cache.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct PersistentCache {
    path: PathBuf,
    max_entries: usize,
    store: Mutex<Store>,
    /// Serializes writers so an older snapshot never replaces a newer one.
    write_lock: Mutex<()>,
    load_warning: Option<CacheError>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PersistentCache {
    /// Open the cache stored at `path`, holding at most `max_entries` entries.
    ///
    /// A missing store starts empty. A corrupt or unreadable store also starts
    /// empty; the problem is logged and kept in [`load_warning`](Self::load_warning).
    /// A `max_entries` of zero is raised to one.
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let max_entries = max_entries.max(1);

        let (mut store, load_warning) = match persist::load(&path) {
            Ok(Some(entries)) => (Store::from_entries(entries), None),
            Ok(None) => {
                log::debug!("No cache store at {}, starting empty", path.display());
                (Store::default(), None)
            }
            Err(e) => {
                log::warn!("{}; starting with an empty cache", e);
                (Store::default(), Some(e))
            }
        };

        let evicted = store.evict_to(max_entries);
        if evicted > 0 {
            log::debug!(
                "Dropped {} cache entries over the {} entry limit",
                evicted,
                max_entries
            );
        }

        Self {
            path,
            max_entries,
            store: Mutex::new(store),
            write_lock: Mutex::new(()),
            load_warning,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(evicted as u64),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, marking it as most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut guard = self.lock();
        let store = &mut *guard;
        let Some(slot) = store.entries.get_mut(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        store.tick += 1;
        store.recency.remove(&slot.last_used);
        slot.last_used = store.tick;
        store.recency.insert(store.tick, key.clone());
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(Store::entry(key, slot))
    }

    /// Look up `key` without touching its recency or the hit counters.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        let store = self.lock();
        store.entries.get(key).map(|slot| Store::entry(key, slot))
    }

    /// Insert or overwrite `key`, evicting least recently used entries if the
    /// cache grows past its capacity.
    pub fn put(&self, key: CacheKey, fingerprint: Fingerprint, version: u32) {
        let mut guard = self.lock();
        let store = &mut *guard;
        store.tick += 1;
        let tick = store.tick;

        match store.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                store.recency.remove(&slot.last_used);
                *slot = Slot {
                    fingerprint,
                    version,
                    last_used: tick,
                };
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    fingerprint,
                    version,
                    last_used: tick,
                });
            }
        }
        store.recency.insert(tick, key);

        let evicted = store.evict_to(self.max_entries);
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    /// Remove a single entry.
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut store = self.lock();
        let slot = store.entries.remove(key)?;
        store.recency.remove(&slot.last_used);
        Some(Store::entry(key, &slot))
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry. The on-disk store is unchanged until the next flush.
    pub fn clear(&self) {
        let mut store = self.lock();
        store.entries.clear();
        store.recency.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().recency.values().cloned().collect()
    }

    /// Copy of every entry, least recently used first.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let store = self.lock();
        store
            .recency
            .values()
            .filter_map(|key| store.entries.get(key).map(|slot| Store::entry(key, slot)))
            .collect()
    }

    /// Write the whole store to the configured location.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the store cannot be written; the previous
    /// file is left untouched.
    pub fn flush(&self) -> CacheResult<()> {
        self.write_to(&self.path)
    }

    /// Write the whole store to `path` without changing the configured location.
    ///
    /// # Errors
    ///
    /// Same as [`flush`](Self::flush).
    pub fn save_as(&self, path: &Path) -> CacheResult<()> {
        self.write_to(path)
    }

    fn write_to(&self, path: &Path) -> CacheResult<()> {
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        persist::save(path, snapshot)
    }

    /// Location the cache loads from and flushes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Why the store could not be loaded, if it was present but unusable.
    pub fn load_warning(&self) -> Option<&CacheError> {
        self.load_warning.as_ref()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
