//! Perceptual fingerprints that survive rotation and mirroring.
//!
//! This module is pure and stateless: a decoded [`SampleGrid`] goes in, a
//! 64-bit [`Fingerprint`] comes out. Fingerprints can be transformed by any of
//! the eight dihedral [`Symmetry`] values with a precomputed bit permutation and
//! compared with a Hamming-distance based similarity score.
//!
//! # Example
//!
//! ```
//! use similar_images::hash::{compute_fingerprint, similarity, SampleGrid, Symmetry, GRID_SIZE};
//!
//! let grid = SampleGrid::from_fn(GRID_SIZE, GRID_SIZE, |x, y| (x * 20 + y * 3) as u8);
//! let original = compute_fingerprint(&grid).unwrap();
//! let rotated = compute_fingerprint(&grid.transformed(Symmetry::Rotate90)).unwrap();
//!
//! assert_eq!(similarity(original, rotated, true), 100);
//! ```

pub mod grid;
pub mod symmetry;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use grid::{SampleGrid, FINGERPRINT_BITS, GRID_SIZE};
pub use symmetry::{compose, Symmetry};

/// Revision of the sampling grid and bit-assignment convention.
///
/// Cached fingerprints carrying a different version are treated as misses.
pub const ALGORITHM_VERSION: u32 = 2;

/// Errors raised by the fingerprint engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The sample grid does not have the shape the algorithm expects.
    #[error("Invalid sample grid: {0}")]
    InvalidInput(String),
}

/// A 64-bit perceptual fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Shorthand for [`transform`].
    #[must_use]
    pub fn transform(self, symmetry: Symmetry) -> Self {
        transform(self, symmetry)
    }

    /// Shorthand for [`hamming_distance`].
    #[must_use]
    pub fn distance(self, other: Fingerprint) -> u32 {
        hamming_distance(self, other)
    }

    /// This fingerprint under each symmetry, in [`Symmetry::ALL`] order.
    #[must_use]
    pub fn orbit(self) -> [Fingerprint; 8] {
        Symmetry::ALL.map(|s| transform(self, s))
    }

    /// Smallest fingerprint in the orbit.
    ///
    /// Fingerprints of the same image under different rotations or mirrors
    /// share a canonical form.
    #[must_use]
    pub fn canonical(self) -> Fingerprint {
        self.orbit().into_iter().min_by_key(|f| f.0).unwrap_or(self)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);
        if digits.is_empty() || digits.len() > 16 {
            return Err(format!("Invalid fingerprint: '{s}' (expected up to 16 hex digits)"));
        }
        u64::from_str_radix(digits, 16)
            .map(Fingerprint)
            .map_err(|e| format!("Invalid fingerprint '{s}': {e}"))
    }
}

/// Compute the fingerprint of a `GRID_SIZE` × `GRID_SIZE` luminance grid.
///
/// Bit `i` is set when the `i`-th ring cell is at least as bright as its inner
/// neighbour (see [`grid`] for the geometry).
///
/// # Errors
///
/// Returns [`HashError::InvalidInput`] if the grid is not exactly
/// `GRID_SIZE` × `GRID_SIZE`.
pub fn compute_fingerprint(samples: &SampleGrid) -> Result<Fingerprint, HashError> {
    if samples.width() != GRID_SIZE || samples.height() != GRID_SIZE {
        return Err(HashError::InvalidInput(format!(
            "expected a {GRID_SIZE}x{GRID_SIZE} grid, got {}x{}",
            samples.width(),
            samples.height()
        )));
    }

    let mut bits = 0u64;
    for (i, &cell) in grid::bit_cells().iter().enumerate() {
        let outer = samples.at_cell(cell);
        let inner = samples.at_cell(grid::inner_neighbour(cell));
        if outer >= inner {
            bits |= 1 << i;
        }
    }
    Ok(Fingerprint(bits))
}

/// Fingerprint of the same image after applying `symmetry`.
///
/// Satisfies `transform(transform(f, a), b) == transform(f, a.then(b))`.
#[must_use]
pub fn transform(fingerprint: Fingerprint, symmetry: Symmetry) -> Fingerprint {
    if symmetry == Symmetry::Identity {
        return fingerprint;
    }
    let table = grid::permutation(symmetry);
    let mut bits = 0u64;
    for (i, &source) in table.iter().enumerate() {
        bits |= ((fingerprint.0 >> source) & 1) << i;
    }
    Fingerprint(bits)
}

/// Number of differing bits, in `0..=64`.
#[must_use]
pub fn hamming_distance(a: Fingerprint, b: Fingerprint) -> u32 {
    (a.0 ^ b.0).count_ones()
}

/// Smallest Hamming distance between `a` and any symmetry of `b`.
#[must_use]
pub fn min_symmetric_distance(a: Fingerprint, b: Fingerprint) -> u32 {
    closest_symmetry(a, b).1
}

/// The symmetry that brings `b` closest to `a`, with the resulting distance.
///
/// Ties resolve to the earliest symmetry in [`Symmetry::ALL`], so an exact
/// match reports [`Symmetry::Identity`].
#[must_use]
pub fn closest_symmetry(a: Fingerprint, b: Fingerprint) -> (Symmetry, u32) {
    Symmetry::ALL
        .iter()
        .map(|&s| (s, hamming_distance(a, transform(b, s))))
        .min_by_key(|&(_, d)| d)
        .unwrap_or((Symmetry::Identity, hamming_distance(a, b)))
}

/// Convert a Hamming distance into a score in `0..=100`.
///
/// `100 - round(100 * distance / 64)`, rounding halves up.
#[must_use]
pub fn similarity_from_distance(distance: u32) -> u8 {
    let bits = FINGERPRINT_BITS as u32;
    let distance = distance.min(bits);
    (100 - (100 * distance + bits / 2) / bits) as u8
}

/// The largest distance that still scores at least `min_similarity`.
#[must_use]
pub fn max_distance_for(min_similarity: u8) -> u32 {
    (0..=FINGERPRINT_BITS as u32)
        .take_while(|&d| similarity_from_distance(d) >= min_similarity)
        .last()
        .unwrap_or(0)
}

/// Similarity score in `0..=100` between two fingerprints.
///
/// With `consider_symmetry`, the closest of the eight rotations/mirrors of `b`
/// is used, so a rotated copy of an image scores like the original.
#[must_use]
pub fn similarity(a: Fingerprint, b: Fingerprint, consider_symmetry: bool) -> u8 {
    let distance = if consider_symmetry {
        min_symmetric_distance(a, b)
    } else {
        hamming_distance(a, b)
    };
    similarity_from_distance(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> SampleGrid {
        SampleGrid::from_fn(GRID_SIZE, GRID_SIZE, |x, y| (x * 23 + y * 5) as u8)
    }

    fn noisy(seed: u64) -> SampleGrid {
        let mut state = seed;
        SampleGrid::from_fn(GRID_SIZE, GRID_SIZE, |_, _| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
    }

    #[test]
    fn test_rejects_wrong_grid_size() {
        let grid = SampleGrid::from_fn(8, 9, |_, _| 0);
        let err = compute_fingerprint(&grid).unwrap_err();
        assert!(matches!(err, HashError::InvalidInput(_)));
        assert!(err.to_string().contains("8x9"));
    }

    #[test]
    fn test_deterministic() {
        let grid = gradient();
        assert_eq!(
            compute_fingerprint(&grid).unwrap(),
            compute_fingerprint(&grid.clone()).unwrap()
        );
    }

    #[test]
    fn test_flat_grid_sets_every_bit() {
        let grid = SampleGrid::from_fn(GRID_SIZE, GRID_SIZE, |_, _| 128);
        assert_eq!(compute_fingerprint(&grid).unwrap().bits(), u64::MAX);
    }

    #[test]
    fn test_grid_symmetry_matches_fingerprint_transform() {
        for seed in 0..16 {
            let grid = noisy(seed);
            let fingerprint = compute_fingerprint(&grid).unwrap();
            for s in Symmetry::ALL {
                let direct = compute_fingerprint(&grid.transformed(s)).unwrap();
                assert_eq!(direct, transform(fingerprint, s), "seed {seed}, {s}");
            }
        }
    }

    #[test]
    fn test_rotated_image_scores_100_with_symmetry() {
        let grid = gradient();
        let original = compute_fingerprint(&grid).unwrap();
        let rotated = compute_fingerprint(&grid.transformed(Symmetry::Rotate90)).unwrap();

        assert_ne!(original, rotated);
        assert_eq!(similarity(original, rotated, true), 100);
        assert!(similarity(original, rotated, false) < 100);
    }

    #[test]
    fn test_similarity_from_distance() {
        assert_eq!(similarity_from_distance(0), 100);
        assert_eq!(similarity_from_distance(1), 98);
        assert_eq!(similarity_from_distance(32), 50);
        assert_eq!(similarity_from_distance(64), 0);
        assert_eq!(similarity_from_distance(200), 0);
    }

    #[test]
    fn test_max_distance_for() {
        assert_eq!(max_distance_for(100), 0);
        assert_eq!(max_distance_for(0), 64);
        let d = max_distance_for(90);
        assert!(similarity_from_distance(d) >= 90);
        assert!(similarity_from_distance(d + 1) < 90);
    }

    #[test]
    fn test_fingerprint_hex_round_trip() {
        let f = Fingerprint::from_bits(0x00ab_cdef_0123_4567);
        assert_eq!(f.to_string(), "00abcdef01234567");
        assert_eq!("00abcdef01234567".parse::<Fingerprint>().unwrap(), f);
        assert_eq!("0xabcdef01234567".parse::<Fingerprint>().unwrap(), f);
        assert!("xyz".parse::<Fingerprint>().is_err());
        assert!("".parse::<Fingerprint>().is_err());
        assert!("11112222333344445".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_closest_symmetry_finds_rotation() {
        let grid = gradient();
        let original = compute_fingerprint(&grid).unwrap();
        let rotated = compute_fingerprint(&grid.transformed(Symmetry::Rotate90)).unwrap();

        let (symmetry, distance) = closest_symmetry(rotated, original);
        assert_eq!(distance, 0);
        assert_eq!(transform(original, symmetry), rotated);
        assert_eq!(closest_symmetry(original, original), (Symmetry::Identity, 0));
    }

    #[test]
    fn test_canonical_is_shared_by_orbit() {
        let f = compute_fingerprint(&noisy(7)).unwrap();
        for g in f.orbit() {
            assert_eq!(g.canonical(), f.canonical());
        }
        assert!(f.orbit().contains(&f.canonical()));
    }

    #[test]
    fn test_identity_transform_is_noop() {
        let f = Fingerprint::from_bits(0xdead_beef_cafe_f00d);
        assert_eq!(f.transform(Symmetry::Identity), f);
    }
}
