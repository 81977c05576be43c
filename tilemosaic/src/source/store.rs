//! Random-access tiled raster store source.

use ndarray::Array3;

use super::{check_tile_shape, BandIndexes, RasterSource};
use crate::coord::TileCoord;
use crate::error::{MosaicError, Result};

/// Reads a tile's footprint out of a raster store.
pub trait TileReader: Send + Sync {
    /// Reads `bands` (1-based, as stored) for `tile` resampled to
    /// `tile_size × tile_size`.
    fn read_tile(&self, tile: &TileCoord, bands: &[usize], tile_size: usize) -> Result<Array3<f32>>;
}

/// [`RasterSource`] over a [`TileReader`].
///
/// Band indexes go to the reader unchanged. Every reader failure is
/// reported as [`MosaicError::SourceUnreadable`]; there is no fallback.
pub struct TiledStoreSource<R: TileReader> {
    reader: R,
}

impl<R: TileReader> TiledStoreSource<R> {
    /// Wraps a reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// The wrapped reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: TileReader> RasterSource for TiledStoreSource<R> {
    fn fetch(&self, tile: &TileCoord, indexes: &BandIndexes, tile_size: usize) -> Result<Array3<f32>> {
        let array = self
            .reader
            .read_tile(tile, indexes.as_slice(), tile_size)
            .map_err(|e| match e {
                MosaicError::SourceUnreadable { .. } => e,
                other => MosaicError::SourceUnreadable {
                    tile: *tile,
                    reason: other.to_string(),
                },
            })?;

        check_tile_shape(tile, &array, indexes.len(), tile_size)?;
        Ok(array)
    }

    fn name(&self) -> &str {
        "store"
    }
}
