//! In-memory raster dataset.

use std::ops::Range;

use ndarray::{s, Array3, ArrayView3};

use super::{check_read, check_write, RasterDataset};
use crate::error::{MosaicError, Result};
use crate::geo::{MosaicProfile, Window};

/// Raster held in an `(count, height, width)` array, initialised to the
/// profile's no-data value.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    profile: MosaicProfile,
    data: Array3<f32>,
    writes: usize,
    closed: bool,
}

impl MemoryDataset {
    /// Allocates the full raster.
    pub fn create(profile: &MosaicProfile) -> Result<Self> {
        let data = Array3::from_elem(
            (profile.count, profile.height, profile.width),
            profile.nodata as f32,
        );
        Ok(Self {
            profile: profile.clone(),
            data,
            writes: 0,
            closed: false,
        })
    }

    /// Number of successful window writes.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Whether [`close`](RasterDataset::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The whole raster.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }
}

fn window_ranges(window: &Window) -> (Range<usize>, Range<usize>) {
    let row = window.row_off as usize;
    let col = window.col_off as usize;
    (row..row + window.height, col..col + window.width)
}

impl RasterDataset for MemoryDataset {
    fn profile(&self) -> &MosaicProfile {
        &self.profile
    }

    fn write_window(&mut self, window: &Window, data: ArrayView3<'_, f32>) -> Result<()> {
        if self.closed {
            return Err(MosaicError::WriteFailure("dataset is closed".to_string()));
        }
        check_write(&self.profile, window, data.dim())?;

        let dtype = self.profile.dtype;
        let (rows, cols) = window_ranges(window);
        self.data
            .slice_mut(s![.., rows, cols])
            .zip_mut_with(&data, |dst, &src| *dst = dtype.cast(src));
        self.writes += 1;
        Ok(())
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f32>> {
        check_read(&self.profile, window)?;
        let (rows, cols) = window_ranges(window);
        Ok(self.data.slice(s![.., rows, cols]).to_owned())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
