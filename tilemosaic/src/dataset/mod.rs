//! Output raster datasets.
//!
//! A [`RasterDataset`] is created from a [`MosaicProfile`] and receives
//! windowed writes of `(channels, height, width)` blocks. It is owned by a
//! single writer; nothing here is shared across threads.
//!
//! - [`MemoryDataset`] keeps the raster in memory. Useful for tests and
//!   small mosaics.
//! - `GeoTiffDataset` (feature `gdal`) writes a tiled, compressed GeoTIFF.

#[cfg(feature = "gdal")]
mod geotiff;
mod memory;

#[cfg(feature = "gdal")]
pub use geotiff::{GeoTiffDataset, OVERVIEW_FACTORS};
pub use memory::MemoryDataset;

use ndarray::{Array3, ArrayView3};

use crate::error::{MosaicError, Result};
use crate::geo::{MosaicProfile, Window};

/// Tiled raster accepting windowed writes.
pub trait RasterDataset {
    /// Profile the dataset was created with.
    fn profile(&self) -> &MosaicProfile;

    /// Writes `data` (`(count, window.height, window.width)`) into `window`.
    ///
    /// Samples are converted to the profile's data type on the way in.
    fn write_window(&mut self, window: &Window, data: ArrayView3<'_, f32>) -> Result<()>;

    /// Reads `window` back as `(count, window.height, window.width)`.
    fn read_window(&self, window: &Window) -> Result<Array3<f32>>;

    /// Flushes and closes the dataset. Writes after closing fail.
    fn close(&mut self) -> Result<()>;
}

/// Checks that `window` lies inside the raster and `shape` matches it.
pub(crate) fn check_write(
    profile: &MosaicProfile,
    window: &Window,
    shape: (usize, usize, usize),
) -> Result<()> {
    if !window.fits_within(profile.width, profile.height) {
        return Err(MosaicError::WriteFailure(format!(
            "window {:?} outside {}x{} raster",
            window, profile.width, profile.height
        )));
    }
    let expected = (profile.count, window.height, window.width);
    if shape != expected {
        return Err(MosaicError::shape_mismatch("window write", expected, shape));
    }
    Ok(())
}

/// Checks that `window` lies inside the raster for a read.
pub(crate) fn check_read(profile: &MosaicProfile, window: &Window) -> Result<()> {
    if !window.fits_within(profile.width, profile.height) {
        return Err(MosaicError::WriteFailure(format!(
            "window {:?} outside {}x{} raster",
            window, profile.width, profile.height
        )));
    }
    Ok(())
}
