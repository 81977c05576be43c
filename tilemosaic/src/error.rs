//! Error types for mosaic construction.
//!
//! Every fatal condition in the pipeline is a [`MosaicError`]. Recoverable
//! conditions in the web tile adapter (non-200 responses, transport failures,
//! wrong tile edge length) never surface here; they are resolved locally.

use thiserror::Error;

use crate::coord::TileCoord;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MosaicError>;

/// Errors that abort a mosaic build.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// The tiled raster store could not be read for a tile.
    #[error("Source unreadable for tile {tile}: {reason}")]
    SourceUnreadable { tile: TileCoord, reason: String },

    /// A buffer did not match the expected (channels, height, width) contract.
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    /// A windowed write into the output dataset failed.
    #[error("Write failed: {0}")]
    WriteFailure(String),

    /// The output profile could not be computed (e.g. inverted zoom range).
    #[error("Profile computation failed: {0}")]
    ProfileComputation(String),

    /// The assembled buffer was not fully covered by leaf tiles.
    #[error("Incomplete mosaic: {placed} of {expected} leaf tiles placed")]
    IncompleteMosaic { expected: usize, placed: usize },

    /// Tile coordinates are outside the grid for their zoom level.
    #[error("Invalid tile {x}/{y} at zoom {z}")]
    InvalidTile { x: u32, y: u32, z: u8 },

    /// Image bytes returned by a tile service could not be decoded.
    #[error("Failed to decode tile {tile}: {reason}")]
    Decode { tile: TileCoord, reason: String },

    /// The inference bridge failed or returned malformed output.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Invalid pipeline configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MosaicError {
    /// Builds a `ShapeMismatch` from two `(channels, height, width)` triples.
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    ) -> Self {
        MosaicError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Whether this error came from reading the source raster.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            MosaicError::SourceUnreadable { .. } | MosaicError::Decode { .. }
        )
    }
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for MosaicError {
    fn from(e: gdal::errors::GdalError) -> Self {
        MosaicError::WriteFailure(e.to_string())
    }
}
