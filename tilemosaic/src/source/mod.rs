//! Raster tile sources.
//!
//! A [`RasterSource`] turns a tile address into a `(channels, tile_size,
//! tile_size)` array of `f32` samples. Two variants exist and are chosen once
//! when the pipeline is built:
//!
//! - [`TiledStoreSource`] reads a random-access raster store through a
//!   [`TileReader`]. Band indexes are 1-based and passed through unchanged.
//!   Every failure is fatal.
//! - [`WebTileSource`] fetches encoded images from a tile-map service. Band
//!   indexes are converted to 0-based channel positions. Failed requests
//!   produce a constant no-data tile instead of an error.
//!
//! # Example
//!
//! ```ignore
//! use tilemosaic::source::{BandIndexes, RasterSource, ReqwestClient, UrlTemplate, WebTileSource};
//!
//! let client = ReqwestClient::new()?;
//! let template = UrlTemplate::new("https://tiles.example.com/{z}/{x}/{y}.png")?;
//! let source = WebTileSource::new(client, template);
//! let pixels = source.fetch(&tile, &BandIndexes::rgb(), 256)?;
//! ```

#[cfg(feature = "gdal")]
mod gdal_reader;
mod http;
mod store;
mod web;

#[cfg(feature = "gdal")]
pub use gdal_reader::GdalTileReader;
pub use http::{HttpClient, HttpError, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use store::{TileReader, TiledStoreSource};
pub use web::{UrlTemplate, WebTileSource};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::fmt;

use ndarray::Array3;

use crate::coord::TileCoord;
use crate::error::{MosaicError, Result};

/// Fetches the pixels of one tile.
///
/// Implementations are shared across worker threads.
pub trait RasterSource: Send + Sync {
    /// Returns an array shaped `(indexes.len(), tile_size, tile_size)`.
    ///
    /// # Arguments
    ///
    /// * `tile` - Tile to fetch
    /// * `indexes` - 1-based band indexes to select
    /// * `tile_size` - Edge length of the returned tile in pixels
    fn fetch(&self, tile: &TileCoord, indexes: &BandIndexes, tile_size: usize) -> Result<Array3<f32>>;

    /// Short name used in log messages.
    fn name(&self) -> &str;
}

impl RasterSource for Box<dyn RasterSource> {
    fn fetch(&self, tile: &TileCoord, indexes: &BandIndexes, tile_size: usize) -> Result<Array3<f32>> {
        (**self).fetch(tile, indexes, tile_size)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Ordered, non-empty list of 1-based band indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandIndexes(Vec<usize>);

impl BandIndexes {
    /// Creates a band list, rejecting empty lists and index `0`.
    pub fn new(indexes: Vec<usize>) -> Result<Self> {
        if indexes.is_empty() {
            return Err(MosaicError::Config("band index list is empty".to_string()));
        }
        if indexes.contains(&0) {
            return Err(MosaicError::Config(
                "band indexes are 1-based; 0 is not a valid band".to_string(),
            ));
        }
        Ok(Self(indexes))
    }

    /// Bands 1, 2 and 3.
    pub fn rgb() -> Self {
        Self(vec![1, 2, 3])
    }

    /// Number of requested bands.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 1-based indexes as given.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// 0-based channel positions.
    pub fn zero_based(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().map(|i| i - 1)
    }
}

impl Default for BandIndexes {
    fn default() -> Self {
        Self::rgb()
    }
}

impl fmt::Display for BandIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl std::str::FromStr for BandIndexes {
    type Err = MosaicError;

    /// Parses a comma-separated list such as `"1,2,3"`.
    fn from_str(s: &str) -> Result<Self> {
        let indexes = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| MosaicError::Config(format!("invalid band index '{}'", part)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(indexes)
    }
}

/// Checks a fetched tile against the `(channels, tile_size, tile_size)` contract.
pub(crate) fn check_tile_shape(
    tile: &TileCoord,
    array: &Array3<f32>,
    channels: usize,
    tile_size: usize,
) -> Result<()> {
    let expected = (channels, tile_size, tile_size);
    let actual = array.dim();
    if actual != expected {
        return Err(MosaicError::shape_mismatch(
            format!("tile {}", tile),
            expected,
            actual,
        ));
    }
    Ok(())
}
