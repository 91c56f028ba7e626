//! The eight dihedral symmetries of a square sampling grid.
//!
//! Every symmetry is stored as a pair `(quarter_turns, mirrored)` meaning
//! "mirror horizontally first (if `mirrored`), then rotate clockwise by
//! `quarter_turns` quarter turns". Points are expressed in *doubled centered*
//! coordinates: for a grid of width `w`, column `x` maps to `u = 2x - (w - 1)`,
//! which keeps the center of even and odd grids on integer coordinates.

use serde::{Deserialize, Serialize};

/// A rotation and/or mirror flip of the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symmetry {
    /// No change.
    Identity,
    /// Quarter turn clockwise.
    Rotate90,
    /// Half turn.
    Rotate180,
    /// Quarter turn counter-clockwise.
    Rotate270,
    /// Mirror left to right.
    FlipHorizontal,
    /// Mirror top to bottom.
    FlipVertical,
    /// Reflection across the main diagonal (`flipH ∘ rotate90`).
    Transpose,
    /// Reflection across the anti-diagonal (`flipV ∘ rotate90`).
    Transverse,
}

impl Symmetry {
    /// All eight symmetries, identity first.
    pub const ALL: [Symmetry; 8] = [
        Symmetry::Identity,
        Symmetry::Rotate90,
        Symmetry::Rotate180,
        Symmetry::Rotate270,
        Symmetry::FlipHorizontal,
        Symmetry::FlipVertical,
        Symmetry::Transpose,
        Symmetry::Transverse,
    ];

    /// Build a symmetry from its canonical parts.
    #[must_use]
    pub fn from_parts(quarter_turns: u8, mirrored: bool) -> Self {
        match (quarter_turns % 4, mirrored) {
            (0, false) => Self::Identity,
            (1, false) => Self::Rotate90,
            (2, false) => Self::Rotate180,
            (3, false) => Self::Rotate270,
            (0, true) => Self::FlipHorizontal,
            (1, true) => Self::Transverse,
            (2, true) => Self::FlipVertical,
            _ => Self::Transpose,
        }
    }

    /// Canonical `(quarter_turns, mirrored)` decomposition.
    #[must_use]
    pub fn parts(self) -> (u8, bool) {
        match self {
            Self::Identity => (0, false),
            Self::Rotate90 => (1, false),
            Self::Rotate180 => (2, false),
            Self::Rotate270 => (3, false),
            Self::FlipHorizontal => (0, true),
            Self::Transverse => (1, true),
            Self::FlipVertical => (2, true),
            Self::Transpose => (3, true),
        }
    }

    /// Position of this symmetry in [`Symmetry::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        let (turns, mirrored) = self.parts();
        turns as usize + if mirrored { 4 } else { 0 }
    }

    /// The symmetry equivalent to applying `self` and then `next`.
    ///
    /// With `g = R^k F^m`, the identity `F R^k = R^-k F` gives
    /// `next ∘ self = R^(k2 ± k1) F^(m1 xor m2)`.
    #[must_use]
    pub fn then(self, next: Symmetry) -> Symmetry {
        let (k1, m1) = self.parts();
        let (k2, m2) = next.parts();
        let turns = if m2 { k2 + 4 - k1 } else { k2 + k1 };
        Symmetry::from_parts(turns % 4, m1 != m2)
    }

    /// The symmetry that undoes `self`.
    #[must_use]
    pub fn inverse(self) -> Symmetry {
        let (turns, mirrored) = self.parts();
        if mirrored {
            // Every reflection is its own inverse.
            self
        } else {
            Symmetry::from_parts((4 - turns) % 4, false)
        }
    }

    /// Whether this symmetry swaps the width and height of a grid.
    #[must_use]
    pub fn swaps_axes(self) -> bool {
        self.parts().0 % 2 == 1
    }

    /// Map a point in doubled centered coordinates.
    #[must_use]
    pub fn apply(self, (u, v): (i32, i32)) -> (i32, i32) {
        let (turns, mirrored) = self.parts();
        let (mut u, mut v) = if mirrored { (-u, v) } else { (u, v) };
        for _ in 0..turns {
            // Clockwise on screen, y axis pointing down.
            (u, v) = (-v, u);
        }
        (u, v)
    }
}

/// Compose two symmetries: the result applies `first`, then `second`.
#[must_use]
pub fn compose(first: Symmetry, second: Symmetry) -> Symmetry {
    first.then(second)
}

impl std::fmt::Display for Symmetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Identity => "identity",
            Self::Rotate90 => "rotate 90",
            Self::Rotate180 => "rotate 180",
            Self::Rotate270 => "rotate 270",
            Self::FlipHorizontal => "flip horizontal",
            Self::FlipVertical => "flip vertical",
            Self::Transpose => "transpose",
            Self::Transverse => "transverse",
        };
        write!(f, "{name}")
    }
}
