//! Luminance sample grids and the fixed fingerprint geometry.
//!
//! The fingerprint samples a 9×9 grid. Every cell outside the center has an
//! *inner neighbour*, the adjacent cell one step toward the center (a diagonal
//! step for cells on a diagonal). Each fingerprint bit compares a cell with its
//! inner neighbour. Bits are assigned in row-major order to the cells of
//! Chebyshev rings 1, 3 and 4, which gives exactly 64 comparisons.
//!
//! Both the ring structure and the inner-neighbour relation commute with the
//! eight dihedral symmetries, and the two cells of a pair always sit on
//! different rings, so no symmetry can swap them. A symmetry of the image is
//! therefore an exact permutation of fingerprint bits.

use std::sync::OnceLock;

use super::symmetry::Symmetry;
use super::HashError;

/// Width and height of the sampling grid expected by the fingerprint.
pub const GRID_SIZE: usize = 9;

/// Number of bits in a fingerprint.
pub const FINGERPRINT_BITS: usize = 64;

const HALF: i32 = (GRID_SIZE as i32 - 1) / 2;

/// A 2-D grid of 8-bit luminance samples in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGrid {
    width: usize,
    height: usize,
    samples: Vec<u8>,
}

impl SampleGrid {
    /// Wrap raw samples.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidInput`] when `samples.len() != width * height`.
    pub fn new(width: usize, height: usize, samples: Vec<u8>) -> Result<Self, HashError> {
        if width.checked_mul(height) != Some(samples.len()) {
            return Err(HashError::InvalidInput(format!(
                "{} samples cannot fill a {}x{} grid",
                samples.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            samples,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Sample at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the grid.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        assert!(x < self.width && y < self.height, "({x}, {y}) outside grid");
        self.samples[y * self.width + x]
    }

    /// The grid as it would be sampled from the image after applying `symmetry`.
    #[must_use]
    pub fn transformed(&self, symmetry: Symmetry) -> SampleGrid {
        let (width, height) = if symmetry.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        let inverse = symmetry.inverse();
        let (src_w, src_h) = (self.width as i32, self.height as i32);

        SampleGrid::from_fn(width, height, |x, y| {
            let u = 2 * x as i32 - (width as i32 - 1);
            let v = 2 * y as i32 - (height as i32 - 1);
            let (su, sv) = inverse.apply((u, v));
            let sx = ((su + src_w - 1) / 2) as usize;
            let sy = ((sv + src_h - 1) / 2) as usize;
            self.get(sx, sy)
        })
    }

    /// Sample at a centered cell offset in `-HALF..=HALF`.
    pub(crate) fn at_cell(&self, (u, v): Cell) -> u8 {
        self.get((u + HALF) as usize, (v + HALF) as usize)
    }
}

/// Cell offset from the grid center, `(column, row)`.
pub(crate) type Cell = (i32, i32);

fn ring((u, v): Cell) -> i32 {
    u.abs().max(v.abs())
}

/// The neighbour one step closer to the center.
pub(crate) fn inner_neighbour((u, v): Cell) -> Cell {
    let du = if u.abs() >= v.abs() { -u.signum() } else { 0 };
    let dv = if v.abs() >= u.abs() { -v.signum() } else { 0 };
    (u + du, v + dv)
}

/// Fingerprint cells, indexed by bit position.
pub(crate) fn bit_cells() -> &'static [Cell; FINGERPRINT_BITS] {
    static CELLS: OnceLock<[Cell; FINGERPRINT_BITS]> = OnceLock::new();
    CELLS.get_or_init(|| {
        let mut cells = [(0, 0); FINGERPRINT_BITS];
        let mut next = 0;
        for v in -HALF..=HALF {
            for u in -HALF..=HALF {
                if matches!(ring((u, v)), 1 | 3 | 4) {
                    cells[next] = (u, v);
                    next += 1;
                }
            }
        }
        debug_assert_eq!(next, FINGERPRINT_BITS);
        cells
    })
}

/// Bit position of a fingerprint cell.
fn bit_index((u, v): Cell) -> Option<usize> {
    bit_cells().iter().position(|&c| c == (u, v))
}

/// `PERMUTATIONS[s][i]` is the source bit that lands in bit `i` under symmetry `s`.
pub(crate) fn permutation(symmetry: Symmetry) -> &'static [u8; FINGERPRINT_BITS] {
    static PERMUTATIONS: OnceLock<[[u8; FINGERPRINT_BITS]; 8]> = OnceLock::new();
    let tables = PERMUTATIONS.get_or_init(|| {
        let mut tables = [[0u8; FINGERPRINT_BITS]; 8];
        for s in Symmetry::ALL {
            let inverse = s.inverse();
            for (i, &(u, v)) in bit_cells().iter().enumerate() {
                // Cells are doubled to reuse the symmetry's point mapping.
                let (su, sv) = inverse.apply((2 * u, 2 * v));
                let source = bit_index((su / 2, sv / 2))
                    .unwrap_or_else(|| unreachable!("rings are closed under symmetries"));
                tables[s.index()][i] = source as u8;
            }
        }
        tables
    });
    &tables[symmetry.index()]
}
