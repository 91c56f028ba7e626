//! Turning image files into luminance sample grids.
//!
//! The trawler only depends on the [`Decoder`] trait. [`ImageDecoder`] is the
//! default implementation, backed by the `image` crate: it decodes the file,
//! converts it to 8-bit luma and resamples it to exactly
//! [`GRID_SIZE`](crate::hash::GRID_SIZE) × `GRID_SIZE`.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::GrayImage;
use thiserror::Error;

use crate::hash::{SampleGrid, GRID_SIZE};

/// Errors that can occur while decoding an image file.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to open or decode the image.
    #[error("Failed to load image {0}: {1}")]
    Load(PathBuf, #[source] image::ImageError),

    /// The decoder produced no pixels.
    #[error("Image has no pixels: {0}")]
    Empty(PathBuf),

    /// A custom decoder failed for its own reasons.
    #[error("Failed to decode {path}: {message}")]
    Other {
        /// File being decoded
        path: PathBuf,
        /// What went wrong
        message: String,
    },
}

/// Produces the sample grid the fingerprint engine consumes.
///
/// Implementations must return a `GRID_SIZE` × `GRID_SIZE` grid and must be
/// safe to call from many worker threads at once.
pub trait Decoder: Send + Sync {
    /// Decode the file at `path` into a luminance grid.
    fn decode(&self, path: &Path) -> Result<SampleGrid, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&Path) -> Result<SampleGrid, DecodeError> + Send + Sync,
{
    fn decode(&self, path: &Path) -> Result<SampleGrid, DecodeError> {
        self(path)
    }
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageDecoder {
    filter: FilterType,
}

impl ImageDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Use a different resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Resample an already decoded grayscale image into a sample grid.
    #[must_use]
    pub fn grid_from_luma(&self, luma: &GrayImage) -> SampleGrid {
        let size = GRID_SIZE as u32;
        let resized = if luma.dimensions() == (size, size) {
            luma.clone()
        } else {
            image::imageops::resize(luma, size, size, self.filter)
        };
        SampleGrid::from_fn(GRID_SIZE, GRID_SIZE, |x, y| {
            resized.get_pixel(x as u32, y as u32).0[0]
        })
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, path: &Path) -> Result<SampleGrid, DecodeError> {
        let img = image::open(path).map_err(|e| DecodeError::Load(path.to_path_buf(), e))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(DecodeError::Empty(path.to_path_buf()));
        }
        Ok(self.grid_from_luma(&img.to_luma8()))
    }
}
