//! GDAL-backed tile reader.
//!
//! Opens any raster GDAL understands (local GeoTIFF, COG over `/vsicurl/`,
//! VRT, ...) and warps it into the Web Mercator grid of the requested tile
//! with cubic resampling. Parts of the tile outside the raster are left at
//! the reader's fill value.

use std::ffi::CStr;
use std::ptr;

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use ndarray::Array3;
use tracing::trace;

use super::TileReader;
use crate::coord::TileCoord;
use crate::error::{MosaicError, Result};
use crate::geo::{AffineTransform, MOSAIC_EPSG};

/// Reads tiles out of a GDAL dataset.
///
/// The dataset is opened per read so that worker threads never share a
/// GDAL handle.
#[derive(Debug, Clone)]
pub struct GdalTileReader {
    path: String,
    fill: f32,
}

impl GdalTileReader {
    /// Creates a reader for a path or GDAL virtual filesystem URI.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fill: 0.0,
        }
    }

    /// Sets the value for pixels outside the raster's extent.
    pub fn with_fill(mut self, fill: f32) -> Self {
        self.fill = fill;
        self
    }

    /// Path or URI of the dataset.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn unreadable(&self, tile: &TileCoord, reason: impl std::fmt::Display) -> MosaicError {
        MosaicError::SourceUnreadable {
            tile: *tile,
            reason: format!("{}: {}", self.path, reason),
        }
    }

    /// Fails when the tile's footprint misses the raster entirely.
    fn check_overlap(&self, tile: &TileCoord, source: &Dataset) -> Result<()> {
        let gt = source.geo_transform().map_err(|e| self.unreadable(tile, e))?;
        let (width, height) = source.raster_size();

        let mut source_srs = source.spatial_ref().map_err(|e| self.unreadable(tile, e))?;
        source_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        let mercator = traditional_srs(MOSAIC_EPSG).map_err(|e| self.unreadable(tile, e))?;
        let to_source =
            CoordTransform::new(&mercator, &source_srs).map_err(|e| self.unreadable(tile, e))?;

        let b = tile.xy_bounds();
        let [min_x, min_y, max_x, max_y] = to_source
            .transform_bounds(&[b.left, b.bottom, b.right, b.top], 21)
            .map_err(|e| self.unreadable(tile, e))?;

        // Raster envelope from its four corners.
        let (mut rx0, mut rx1) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut ry0, mut ry1) = (f64::INFINITY, f64::NEG_INFINITY);
        for (col, row) in [(0, 0), (width, 0), (0, height), (width, height)] {
            let (col, row) = (col as f64, row as f64);
            let x = gt[0] + col * gt[1] + row * gt[2];
            let y = gt[3] + col * gt[4] + row * gt[5];
            rx0 = rx0.min(x);
            rx1 = rx1.max(x);
            ry0 = ry0.min(y);
            ry1 = ry1.max(y);
        }

        if max_x <= rx0 || min_x >= rx1 || max_y <= ry0 || min_y >= ry1 {
            return Err(self.unreadable(tile, "tile does not intersect the raster"));
        }
        Ok(())
    }

    /// Creates the in-memory destination covering `tile` in EPSG:3857.
    fn tile_dataset(&self, tile: &TileCoord, band_count: usize, tile_size: usize) -> Result<Dataset> {
        let driver = DriverManager::get_driver_by_name("MEM").map_err(|e| self.unreadable(tile, e))?;
        let mut dataset = driver
            .create_with_band_type::<f32, _>("", tile_size, tile_size, band_count)
            .map_err(|e| self.unreadable(tile, e))?;

        let bounds = tile.xy_bounds();
        let transform = AffineTransform::north_up(bounds.left, bounds.top, bounds.width() / tile_size as f64);
        dataset
            .set_geo_transform(&transform.to_gdal())
            .map_err(|e| self.unreadable(tile, e))?;
        let mercator = traditional_srs(MOSAIC_EPSG).map_err(|e| self.unreadable(tile, e))?;
        dataset
            .set_spatial_ref(&mercator)
            .map_err(|e| self.unreadable(tile, e))?;

        // The warp leaves uncovered destination pixels untouched.
        for index in 1..=band_count {
            let mut band = dataset.rasterband(index).map_err(|e| self.unreadable(tile, e))?;
            band.fill(f64::from(self.fill), None)
                .map_err(|e| self.unreadable(tile, e))?;
        }
        Ok(dataset)
    }

    /// Warps `bands` of `source` into bands `1..=bands.len()` of `target`.
    fn warp(
        &self,
        tile: &TileCoord,
        source: &Dataset,
        target: &Dataset,
        bands: &[usize],
        tile_size: usize,
    ) -> Result<()> {
        use gdal_sys::{
            CPLErr, CPLGetLastErrorMsg, CPLMalloc, GDALChunkAndWarpImage, GDALCreateGenImgProjTransformer2,
            GDALCreateWarpOperation, GDALCreateWarpOptions, GDALDestroyGenImgProjTransformer,
            GDALDestroyWarpOperation, GDALDestroyWarpOptions, GDALGenImgProjTransform, GDALResampleAlg,
        };

        let size = i32::try_from(tile_size).map_err(|_| self.unreadable(tile, "tile size out of range"))?;
        let band_count =
            i32::try_from(bands.len()).map_err(|_| self.unreadable(tile, "too many bands"))?;
        let source_bands = bands
            .iter()
            .map(|&b| i32::try_from(b))
            .collect::<std::result::Result<Vec<i32>, _>>()
            .map_err(|_| self.unreadable(tile, "band index out of range"))?;

        let h_src = source.c_dataset();
        let h_dst = target.c_dataset();

        // SAFETY: both dataset handles outlive the warp; the options, transformer
        // and operation are created and destroyed within this block.
        let rv = unsafe {
            let options = GDALCreateWarpOptions();
            (*options).hSrcDS = h_src;
            (*options).hDstDS = h_dst;

            (*options).nBandCount = band_count;
            let n = std::mem::size_of::<i32>() * source_bands.len();
            (*options).panSrcBands = CPLMalloc(n).cast::<i32>();
            (*options).panDstBands = CPLMalloc(n).cast::<i32>();
            for (i, (&src, dst)) in source_bands.iter().zip(1..).enumerate() {
                (*options).panSrcBands.add(i).write(src);
                (*options).panDstBands.add(i).write(dst);
            }

            (*options).eResampleAlg = GDALResampleAlg::GRA_Cubic;
            (*options).pTransformerArg = GDALCreateGenImgProjTransformer2(h_src, h_dst, ptr::null_mut());
            if (*options).pTransformerArg.is_null() {
                GDALDestroyWarpOptions(options);
                CPLErr::CE_Failure
            } else {
                (*options).pfnTransformer = Some(GDALGenImgProjTransform);

                let operation = GDALCreateWarpOperation(options);
                let rv = if operation.is_null() {
                    CPLErr::CE_Failure
                } else {
                    let rv = GDALChunkAndWarpImage(operation, 0, 0, size, size);
                    GDALDestroyWarpOperation(operation);
                    rv
                };
                GDALDestroyGenImgProjTransformer((*options).pTransformerArg);
                GDALDestroyWarpOptions(options);
                rv
            }
        };

        if rv != CPLErr::CE_None {
            // SAFETY: GDAL returns a valid, NUL-terminated thread-local message.
            let message = unsafe { CStr::from_ptr(CPLGetLastErrorMsg()) };
            return Err(self.unreadable(tile, format!("warp failed: {}", message.to_string_lossy())));
        }
        Ok(())
    }
}

fn traditional_srs(epsg: u32) -> gdal::errors::Result<SpatialRef> {
    let mut srs = SpatialRef::from_epsg(epsg)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

impl TileReader for GdalTileReader {
    fn read_tile(&self, tile: &TileCoord, bands: &[usize], tile_size: usize) -> Result<Array3<f32>> {
        let source = Dataset::open(&self.path).map_err(|e| self.unreadable(tile, e))?;
        let band_total = source.raster_count();
        if let Some(&bad) = bands.iter().find(|&&b| b == 0 || b > band_total) {
            return Err(self.unreadable(tile, format!("band {} not in 1..={}", bad, band_total)));
        }
        self.check_overlap(tile, &source)?;

        let target = self.tile_dataset(tile, bands.len(), tile_size)?;
        trace!(tile = %tile, ?bands, tile_size, "Warping source into tile grid");
        self.warp(tile, &source, &target, bands, tile_size)?;

        let mut array = Array3::from_elem((bands.len(), tile_size, tile_size), self.fill);
        for (channel, mut plane) in array.outer_iter_mut().enumerate() {
            let band = target
                .rasterband(channel + 1)
                .map_err(|e| self.unreadable(tile, e))?;
            let buffer = band
                .read_as::<f32>((0, 0), (tile_size, tile_size), (tile_size, tile_size), None)
                .map_err(|e| self.unreadable(tile, format!("band {}: {}", bands[channel], e)))?;
            for (dst, &src) in plane.iter_mut().zip(buffer.data()) {
                *dst = src;
            }
        }

        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::raster::Buffer;

    const EARTH_RADIUS: f64 = 6_378_137.0;

    fn write_bands(
        path: &std::path::Path,
        size: usize,
        geo_transform: [f64; 6],
        epsg: u32,
        bands: &[Vec<f32>],
    ) {
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut ds = driver
            .create_with_band_type::<f32, _>(path, size, size, bands.len())
            .unwrap();
        ds.set_geo_transform(&geo_transform).unwrap();
        ds.set_spatial_ref(&traditional_srs(epsg).unwrap()).unwrap();
        for (i, values) in bands.iter().enumerate() {
            let mut buffer = Buffer::new((size, size), values.clone());
            ds.rasterband(i + 1)
                .unwrap()
                .write((0, 0), (size, size), &mut buffer)
                .unwrap();
        }
    }

    /// 2-band EPSG:3857 store covering `tile` at 512×512, band 1 = 10, band 2 = 20.
    fn write_constant_fixture(path: &std::path::Path, tile: &TileCoord) {
        let b = tile.xy_bounds();
        let gt = [b.left, b.width() / 512.0, 0.0, b.top, 0.0, -b.height() / 512.0];
        write_bands(path, 512, gt, 3857, &[vec![10.0; 512 * 512], vec![20.0; 512 * 512]]);
    }

    /// Center of destination pixel `(row, col)` of `tile` in EPSG:3857.
    fn pixel_center(tile: &TileCoord, row: usize, col: usize, tile_size: usize) -> (f64, f64) {
        let b = tile.xy_bounds();
        let transform = AffineTransform::north_up(b.left, b.top, b.width() / tile_size as f64);
        assert_eq!(transform.origin(), (b.left, b.top));
        transform.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    #[test]
    fn test_reads_requested_bands_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.tif");
        let tile = TileCoord::new(23578, 51380, 17).unwrap();
        write_constant_fixture(&path, &tile);

        let reader = GdalTileReader::new(path.to_string_lossy());
        let array = reader.read_tile(&tile, &[2, 1], 256).unwrap();

        assert_eq!(array.dim(), (2, 256, 256));
        assert!((array[[0, 128, 128]] - 20.0).abs() < 1e-3);
        assert!((array[[1, 128, 128]] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_geographic_store_is_warped_into_tile_grid() {
        // 1000×1000 EPSG:4326 raster over lon 10..11, lat 45..46 at 0.001°.
        // Band 1 holds the longitude of each pixel center, band 2 its latitude.
        let size = 1000;
        let step = 0.001;
        let lon = (0..size * size)
            .map(|i| (10.0 + ((i % size) as f64 + 0.5) * step) as f32)
            .collect::<Vec<_>>();
        let lat = (0..size * size)
            .map(|i| (46.0 - ((i / size) as f64 + 0.5) * step) as f32)
            .collect::<Vec<_>>();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geographic.tif");
        write_bands(&path, size, [10.0, step, 0.0, 46.0, 0.0, -step], 4326, &[lon, lat]);

        // Tile around (10.49°E, 45.49°N).
        let tile = TileCoord::new(8669, 5861, 14).unwrap();
        let reader = GdalTileReader::new(path.to_string_lossy());
        let array = reader.read_tile(&tile, &[1, 2], 256).unwrap();

        for (row, col) in [(0, 0), (37, 201), (128, 128), (255, 255)] {
            let (x, y) = pixel_center(&tile, row, col, 256);
            let expected_lon = (x / EARTH_RADIUS).to_degrees();
            let expected_lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
            assert!(
                (f64::from(array[[0, row, col]]) - expected_lon).abs() < 2e-5,
                "lon at ({row}, {col}): {} vs {expected_lon}",
                array[[0, row, col]]
            );
            assert!(
                (f64::from(array[[1, row, col]]) - expected_lat).abs() < 2e-5,
                "lat at ({row}, {col}): {} vs {expected_lat}",
                array[[1, row, col]]
            );
        }
    }

    #[test]
    fn test_adjacent_tiles_join_without_seam() {
        // EPSG:3857 store spanning four z17 tiles at 100 px per tile, holding
        // the distance in meters from its west edge.
        let west = TileCoord::new(23577, 51380, 17).unwrap();
        let b = west.xy_bounds();
        let res = b.width() / 100.0;
        let size = 400;
        let values = (0..size * size)
            .map(|i| (((i % size) as f64 + 0.5) * res) as f32)
            .collect::<Vec<_>>();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.tif");
        write_bands(&path, size, [b.left, res, 0.0, b.top, 0.0, -res], 3857, &[values]);

        let reader = GdalTileReader::new(path.to_string_lossy());
        let left = TileCoord::new(23578, 51380, 17).unwrap();
        let right = TileCoord::new(23579, 51380, 17).unwrap();
        let a = reader.read_tile(&left, &[1], 256).unwrap();
        let c = reader.read_tile(&right, &[1], 256).unwrap();

        let expected = |tile: &TileCoord, col: usize| pixel_center(tile, 100, col, 256).0 - b.left;
        for (array, tile) in [(&a, &left), (&c, &right)] {
            for col in [0, 1, 128, 254, 255] {
                assert!(
                    (f64::from(array[[0, 100, col]]) - expected(tile, col)).abs() < 1e-2,
                    "{tile} col {col}: {} vs {}",
                    array[[0, 100, col]],
                    expected(tile, col)
                );
            }
        }

        let dest_res = b.width() / 256.0;
        let step = f64::from(c[[0, 100, 0]] - a[[0, 100, 255]]);
        assert!((step - dest_res).abs() < 1e-2);
    }

    #[test]
    fn test_uncovered_pixels_keep_fill() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.tif");
        let store_tile = TileCoord::new(23578, 51380, 17).unwrap();
        write_constant_fixture(&path, &store_tile);

        // The parent tile is four times larger; only its covered quadrant has data.
        let parent = TileCoord::new(11789, 25690, 16).unwrap();
        let reader = GdalTileReader::new(path.to_string_lossy()).with_fill(-9.0);
        let array = reader.read_tile(&parent, &[1], 256).unwrap();

        assert!((array[[0, 64, 64]] - 10.0).abs() < 1e-3);
        assert_eq!(array[[0, 192, 192]], -9.0);
    }

    #[test]
    fn test_missing_band_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.tif");
        let tile = TileCoord::new(23578, 51380, 17).unwrap();
        write_constant_fixture(&path, &tile);

        let reader = GdalTileReader::new(path.to_string_lossy());
        let err = reader.read_tile(&tile, &[3], 256).unwrap_err();
        assert!(err.to_string().contains("band 3"));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let reader = GdalTileReader::new("/nonexistent/store.tif");
        let tile = TileCoord::new(0, 0, 1).unwrap();
        let err = reader.read_tile(&tile, &[1], 256).unwrap_err();
        assert!(matches!(err, MosaicError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_tile_outside_raster_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.tif");
        write_constant_fixture(&path, &TileCoord::new(23578, 51380, 17).unwrap());

        let reader = GdalTileReader::new(path.to_string_lossy());
        let far_away = TileCoord::new(0, 0, 17).unwrap();
        assert!(reader.read_tile(&far_away, &[1], 256).is_err());
    }
}
