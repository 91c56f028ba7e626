//! Ranking fingerprinted images against a needle.
//!
//! [`SimilarityIndex`] stores records in a BK-tree so a query only visits
//! fingerprints that can possibly reach the requested similarity. When
//! symmetry is considered, records are keyed by their
//! [canonical](Fingerprint::canonical) fingerprint and compared with the
//! minimum distance over all eight symmetries. Each symmetry is a Hamming
//! isometry, so that distance is still a metric between orbits.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::PathBuf;

use bk_tree::{BKTree, Metric};
use serde::Serialize;

use crate::hash::{
    closest_symmetry, hamming_distance, max_distance_for, min_symmetric_distance,
    similarity_from_distance, Fingerprint, Symmetry,
};
use crate::trawler::ImageRecord;

/// A record that matched a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    /// Score in `0..=100`
    pub similarity: u8,
    /// Hamming distance behind the score
    pub distance: u32,
    /// Symmetry that maps the match onto the needle
    pub symmetry: Symmetry,
}

/// Hamming distance between fingerprints, optionally minimized over symmetries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintMetric {
    consider_symmetry: bool,
}

impl FingerprintMetric {
    #[must_use]
    pub fn new(consider_symmetry: bool) -> Self {
        Self { consider_symmetry }
    }
}

impl Metric<Fingerprint> for FingerprintMetric {
    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> u32 {
        if self.consider_symmetry {
            min_symmetric_distance(*a, *b)
        } else {
            hamming_distance(*a, *b)
        }
    }

    fn threshold_distance(&self, a: &Fingerprint, b: &Fingerprint, threshold: u32) -> Option<u32> {
        let d = self.distance(a, b);
        if d <= threshold {
            Some(d)
        } else {
            None
        }
    }
}

/// Index for finding records similar to a needle fingerprint.
pub struct SimilarityIndex {
    consider_symmetry: bool,
    tree: BKTree<Fingerprint, FingerprintMetric>,
    /// Records sharing a tree key. The tree ignores duplicate keys.
    groups: HashMap<Fingerprint, Vec<usize>>,
    records: Vec<ImageRecord>,
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("consider_symmetry", &self.consider_symmetry)
            .field("records", &self.records.len())
            .field("distinct_keys", &self.groups.len())
            .finish()
    }
}

impl SimilarityIndex {
    /// Create a new empty similarity index.
    #[must_use]
    pub fn new(consider_symmetry: bool) -> Self {
        Self {
            consider_symmetry,
            tree: BKTree::new(FingerprintMetric::new(consider_symmetry)),
            groups: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// Build an index over `records`.
    pub fn from_records(records: impl IntoIterator<Item = ImageRecord>, consider_symmetry: bool) -> Self {
        let mut index = Self::new(consider_symmetry);
        for record in records {
            index.insert(record);
        }
        index
    }

    fn key(&self, fingerprint: Fingerprint) -> Fingerprint {
        if self.consider_symmetry {
            fingerprint.canonical()
        } else {
            fingerprint
        }
    }

    pub fn insert(&mut self, record: ImageRecord) {
        let key = self.key(record.fingerprint);
        let index = self.records.len();
        self.records.push(record);

        let group = self.groups.entry(key).or_default();
        if group.is_empty() {
            self.tree.add(key);
        }
        group.push(index);
    }

    /// Returns the number of records in the index.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn consider_symmetry(&self) -> bool {
        self.consider_symmetry
    }

    /// Records scoring at least `min_similarity` against `needle`, best first.
    ///
    /// Equal scores are ordered by path.
    pub fn find(&self, needle: Fingerprint, min_similarity: u8) -> Vec<Match> {
        let tolerance = max_distance_for(min_similarity);
        let key = self.key(needle);

        let mut matches: Vec<Match> = self
            .tree
            .find(&key, tolerance)
            .filter_map(|(_, k)| self.groups.get(k))
            .flatten()
            .map(|&i| self.score(needle, &self.records[i]))
            .filter(|m| m.similarity >= min_similarity)
            .collect();

        sort_matches(&mut matches);
        matches
    }

    fn score(&self, needle: Fingerprint, record: &ImageRecord) -> Match {
        score(needle, record, self.consider_symmetry)
    }
}

fn score(needle: Fingerprint, record: &ImageRecord, consider_symmetry: bool) -> Match {
    let (symmetry, distance) = if consider_symmetry {
        closest_symmetry(needle, record.fingerprint)
    } else {
        (Symmetry::Identity, hamming_distance(needle, record.fingerprint))
    };
    Match {
        path: record.path.clone(),
        fingerprint: record.fingerprint,
        similarity: similarity_from_distance(distance),
        distance,
        symmetry,
    }
}

fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        Reverse(a.similarity)
            .cmp(&Reverse(b.similarity))
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Score every record against `needle` without building an index.
pub fn rank(
    needle: Fingerprint,
    records: &[ImageRecord],
    consider_symmetry: bool,
    min_similarity: u8,
) -> Vec<Match> {
    let mut matches: Vec<Match> = records
        .iter()
        .map(|r| score(needle, r, consider_symmetry))
        .filter(|m| m.similarity >= min_similarity)
        .collect();
    sort_matches(&mut matches);
    matches
}
