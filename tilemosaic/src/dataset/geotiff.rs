//! Tiled GeoTIFF output through GDAL.

use std::path::{Path, PathBuf};

use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array3, ArrayView3, Axis};
use tracing::{debug, info};

use super::{check_read, check_write, RasterDataset};
use crate::error::{MosaicError, Result};
use crate::geo::{DataType, MosaicProfile, Window, MOSAIC_EPSG};

/// Overview decimation factors built on close.
pub const OVERVIEW_FACTORS: [i32; 4] = [2, 4, 8, 16];

/// GeoTIFF written block by block.
///
/// Creation options come from the profile: `TILED=YES`, block size,
/// compression and interleave.
pub struct GeoTiffDataset {
    path: PathBuf,
    profile: MosaicProfile,
    dataset: Option<Dataset>,
    overviews: bool,
}

impl GeoTiffDataset {
    /// Creates the file at `path`, overwriting any existing file.
    pub fn create(path: &Path, profile: &MosaicProfile) -> Result<Self> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;

        let mut options = CslStringList::new();
        options.set_name_value("TILED", "YES")?;
        options.set_name_value("BLOCKXSIZE", &profile.block_size.to_string())?;
        options.set_name_value("BLOCKYSIZE", &profile.block_size.to_string())?;
        options.set_name_value("COMPRESS", profile.compression.as_gdal())?;
        options.set_name_value("INTERLEAVE", profile.interleave.as_gdal())?;
        options.set_name_value("BIGTIFF", "IF_SAFER")?;

        let mut dataset = match profile.dtype {
            DataType::UInt8 => driver.create_with_band_type_with_options::<u8, _>(
                path,
                profile.width,
                profile.height,
                profile.count,
                &options,
            )?,
            DataType::Float32 => driver.create_with_band_type_with_options::<f32, _>(
                path,
                profile.width,
                profile.height,
                profile.count,
                &options,
            )?,
        };

        dataset.set_geo_transform(&profile.transform.to_gdal())?;
        dataset.set_spatial_ref(&SpatialRef::from_epsg(MOSAIC_EPSG)?)?;
        dataset.set_metadata_item("TILEMOSAIC_VERSION", crate::VERSION, "")?;
        for band_index in 1..=profile.count {
            dataset
                .rasterband(band_index)?
                .set_no_data_value(Some(profile.nodata))?;
        }

        info!(
            path = %path.display(),
            width = profile.width,
            height = profile.height,
            count = profile.count,
            dtype = %profile.dtype,
            "Created GeoTIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            profile: profile.clone(),
            dataset: Some(dataset),
            overviews: false,
        })
    }

    /// Builds averaged overviews (see [`OVERVIEW_FACTORS`]) when closing.
    pub fn with_overviews(mut self, enabled: bool) -> Self {
        self.overviews = enabled;
        self
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_dataset(&self) -> Result<&Dataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| MosaicError::WriteFailure(format!("{} is closed", self.path.display())))
    }

    fn write_band<T: GdalType + Copy>(
        dataset: &Dataset,
        band_index: usize,
        window: &Window,
        samples: Vec<T>,
    ) -> Result<()> {
        let mut buffer = Buffer::new((window.width, window.height), samples);
        dataset.rasterband(band_index)?.write(
            (window.col_off as isize, window.row_off as isize),
            (window.width, window.height),
            &mut buffer,
        )?;
        Ok(())
    }
}

impl RasterDataset for GeoTiffDataset {
    fn profile(&self) -> &MosaicProfile {
        &self.profile
    }

    fn write_window(&mut self, window: &Window, data: ArrayView3<'_, f32>) -> Result<()> {
        check_write(&self.profile, window, data.dim())?;
        let dataset = self.open_dataset()?;

        for (channel, plane) in data.axis_iter(Axis(0)).enumerate() {
            let band_index = channel + 1;
            match self.profile.dtype {
                DataType::UInt8 => {
                    let samples = plane.iter().map(|&v| v as u8).collect();
                    Self::write_band::<u8>(dataset, band_index, window, samples)?
                }
                DataType::Float32 => {
                    let samples = plane.iter().copied().collect();
                    Self::write_band::<f32>(dataset, band_index, window, samples)?
                }
            }
        }
        Ok(())
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f32>> {
        check_read(&self.profile, window)?;
        let dataset = self.open_dataset()?;

        let mut out = Array3::zeros((self.profile.count, window.height, window.width));
        for (channel, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            let buffer = dataset.rasterband(channel + 1)?.read_as::<f32>(
                (window.col_off as isize, window.row_off as isize),
                (window.width, window.height),
                (window.width, window.height),
                None,
            )?;
            for (dst, &src) in plane.iter_mut().zip(buffer.data()) {
                *dst = src;
            }
        }
        Ok(out)
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut dataset) = self.dataset.take() else {
            return Ok(());
        };

        if self.overviews {
            debug!(path = %self.path.display(), factors = ?OVERVIEW_FACTORS, "Building overviews");
            dataset.build_overviews("AVERAGE", &OVERVIEW_FACTORS, &[])?;
        }
        dataset.flush_cache()?;
        info!(path = %self.path.display(), "Closed GeoTIFF");
        Ok(())
    }
}

impl Drop for GeoTiffDataset {
    fn drop(&mut self) {
        if let Some(mut dataset) = self.dataset.take() {
            let _ = dataset.flush_cache();
        }
    }
}
