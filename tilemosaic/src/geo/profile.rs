//! Output raster profile.

use std::fmt;

use super::transform::{zoom_tile_transform, AffineTransform};
use crate::coord::TileCoord;
use crate::error::{MosaicError, Result};

/// Coordinate reference system of every mosaic.
pub const MOSAIC_CRS: &str = "EPSG:3857";

/// EPSG code of [`MOSAIC_CRS`].
pub const MOSAIC_EPSG: u32 = 3857;

/// Internal tile edge of the output raster.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Sample type of the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    UInt8,
    Float32,
}

impl DataType {
    /// Converts a working `f32` sample to this type's value range.
    ///
    /// `UInt8` rounds toward zero and saturates at `0` and `255`; NaN becomes `0`.
    #[inline]
    pub fn cast(&self, value: f32) -> f32 {
        match self {
            DataType::UInt8 => (value as u8) as f32,
            DataType::Float32 => value,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::UInt8 => write!(f, "uint8"),
            DataType::Float32 => write!(f, "float32"),
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uint8" | "byte" => Ok(DataType::UInt8),
            "float32" => Ok(DataType::Float32),
            other => Err(MosaicError::Config(format!("unknown data type '{}'", other))),
        }
    }
}

/// Compression codec for the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Lzw,
    Deflate,
    None,
}

impl Compression {
    /// GDAL creation option value.
    pub fn as_gdal(&self) -> &'static str {
        match self {
            Compression::Lzw => "LZW",
            Compression::Deflate => "DEFLATE",
            Compression::None => "NONE",
        }
    }
}

/// Sample layout of the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interleave {
    #[default]
    Pixel,
    Band,
}

impl Interleave {
    /// GDAL creation option value.
    pub fn as_gdal(&self) -> &'static str {
        match self {
            Interleave::Pixel => "PIXEL",
            Interleave::Band => "BAND",
        }
    }
}

/// Everything a tiled-raster writer needs to create the output file.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicProfile {
    pub crs: String,
    pub transform: AffineTransform,
    pub width: usize,
    pub height: usize,
    pub count: usize,
    pub dtype: DataType,
    pub block_size: usize,
    pub compression: Compression,
    pub interleave: Interleave,
    pub nodata: f64,
}


/// Builds the output profile for `tile` at the pixel size of `zoom`.
///
/// # Arguments
///
/// * `tile` - Outer root tile whose footprint the mosaic covers
/// * `zoom` - Super-resolution zoom level
/// * `padding` - Extra pixels around the footprint
/// * `count` - Number of output channels
/// * `dtype` - Output sample type
/// * `nodata` - Fill value for unwritten pixels
pub fn create_webmercator_profile(
    tile: &TileCoord,
    zoom: u8,
    padding: u32,
    count: usize,
    dtype: DataType,
    nodata: f64,
) -> Result<MosaicProfile> {
    if count == 0 {
        return Err(MosaicError::ProfileComputation(
            "output must have at least one channel".to_string(),
        ));
    }

    let (transform, width, height) = zoom_tile_transform(zoom, tile, padding)?;

    Ok(MosaicProfile {
        crs: MOSAIC_CRS.to_string(),
        transform,
        width,
        height,
        count,
        dtype,
        block_size: DEFAULT_BLOCK_SIZE,
        compression: Compression::default(),
        interleave: Interleave::default(),
        nodata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults() {
        let root = TileCoord::new(23578, 51380, 17).unwrap();
        let profile = create_webmercator_profile(&root, 19, 250, 3, DataType::UInt8, 0.0).unwrap();

        assert_eq!(profile.crs, "EPSG:3857");
        assert_eq!(profile.width, 1524);
        assert_eq!(profile.height, 1524);
        assert_eq!(profile.count, 3);
        assert_eq!(profile.block_size, 512);
        assert_eq!(profile.compression, Compression::Lzw);
        assert_eq!(profile.interleave, Interleave::Pixel);
        assert_eq!(profile.dtype, DataType::UInt8);
    }

    #[test]
    fn test_zero_channels_rejected() {
        let root = TileCoord::new(0, 0, 1).unwrap();
        let result = create_webmercator_profile(&root, 2, 0, 0, DataType::UInt8, 0.0);
        assert!(matches!(result, Err(MosaicError::ProfileComputation(_))));
    }

    #[test]
    fn test_uint8_cast_saturates() {
        assert_eq!(DataType::UInt8.cast(-3.0), 0.0);
        assert_eq!(DataType::UInt8.cast(300.0), 255.0);
        assert_eq!(DataType::UInt8.cast(12.9), 12.0);
        assert_eq!(DataType::UInt8.cast(f32::NAN), 0.0);
        assert_eq!(DataType::Float32.cast(0.25), 0.25);
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!("UInt8".parse::<DataType>().unwrap(), DataType::UInt8);
        assert_eq!("float32".parse::<DataType>().unwrap(), DataType::Float32);
        assert!("int16".parse::<DataType>().is_err());
    }
}
