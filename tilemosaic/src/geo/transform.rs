//! Affine geotransforms and pixel windows in Web Mercator.
//!
//! The output mosaic is a north-up raster in EPSG:3857 whose pixel size is
//! that of the super-resolution zoom level. A root tile's raster is the
//! tile's own footprint plus a ring of padding pixels on every side.
//!
//! # Pixel size
//!
//! ```text
//! meters_per_pixel(z) = 40075016 / 2^(8 + z)
//! ```
//!
//! The numerator is the rounded equatorial circumference, so the value at
//! `z + 1` is always exactly half the value at `z`.

use crate::coord::{MercatorBounds, TileCoord, MAX_ZOOM};
use crate::error::{MosaicError, Result};

/// Padding, in pixels, added around a root tile's raster on every side.
pub const DEFAULT_PADDING: u32 = 250;

/// Edge length of a web-mercator tile in pixels; [`meters_per_pixel`] is
/// defined on this grid.
pub const TILE_PIXELS: usize = 256;

/// Rounded equatorial circumference used for pixel sizes.
const EQUATOR_METERS: f64 = 40_075_016.0;

/// Ground resolution of a 256-pixel tile grid at `zoom`, in meters per pixel.
#[inline]
pub fn meters_per_pixel(zoom: u8) -> f64 {
    EQUATOR_METERS / 2.0_f64.powi(8 + zoom as i32)
}

/// Six-coefficient affine transform from pixel to map coordinates.
///
/// Coefficients follow the `(a, b, c, d, e, f)` convention:
///
/// ```text
/// x = a·col + b·row + c
/// y = d·col + e·row + f
/// ```
///
/// For north-up rasters `b = d = 0` and `e` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// Creates a transform from its six coefficients.
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with square pixels anchored at the top-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_size: f64) -> Self {
        Self::new(pixel_size, 0.0, origin_x, 0.0, -pixel_size, origin_y)
    }

    /// Width of one pixel in map units.
    #[inline]
    pub fn pixel_width(&self) -> f64 {
        self.a
    }

    /// Height of one pixel in map units (positive).
    #[inline]
    pub fn pixel_height(&self) -> f64 {
        -self.e
    }

    /// Map coordinates of the raster's top-left corner.
    #[inline]
    pub fn origin(&self) -> (f64, f64) {
        (self.c, self.f)
    }

    /// Map coordinates of a pixel corner.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Coefficients in GDAL order: `[c, a, b, f, d, e]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Builds a transform from GDAL-ordered coefficients.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0 && self.a > 0.0 && self.e < 0.0
    }
}

/// Computes the transform and pixel dimensions for `tile` rendered at `zoom`.
///
/// The raster covers the tile's projected bounds at the pixel size of `zoom`
/// with `padding` extra pixels on each side. The origin is the tile's
/// north-west corner moved outward by `padding` pixels.
///
/// # Arguments
///
/// * `zoom` - Zoom level whose pixel size the raster uses
/// * `tile` - Tile whose footprint the raster covers
/// * `padding` - Extra pixels on every side
///
/// # Returns
///
/// `(transform, width, height)`.
///
/// # Errors
///
/// Returns [`MosaicError::ProfileComputation`] if `zoom` is coarser than the
/// tile's own zoom level or beyond the maximum zoom.
pub fn zoom_tile_transform(
    zoom: u8,
    tile: &TileCoord,
    padding: u32,
) -> Result<(AffineTransform, usize, usize)> {
    if zoom < tile.z() {
        return Err(MosaicError::ProfileComputation(format!(
            "zoom {} is coarser than tile {}",
            zoom, tile
        )));
    }
    if zoom > MAX_ZOOM {
        return Err(MosaicError::ProfileComputation(format!(
            "zoom {} exceeds maximum {}",
            zoom, MAX_ZOOM
        )));
    }

    let bounds = tile.xy_bounds();
    let pixel_size = meters_per_pixel(zoom);
    let pad = f64::from(padding);

    let width = (bounds.width() / pixel_size) as usize + 2 * padding as usize;
    let height = (bounds.height() / pixel_size) as usize + 2 * padding as usize;

    let transform = AffineTransform::north_up(
        bounds.left - pad * pixel_size,
        bounds.top + pad * pixel_size,
        pixel_size,
    );

    Ok((transform, width, height))
}

/// Rectangular block of pixels inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col_off: i64,
    pub row_off: i64,
    pub width: usize,
    pub height: usize,
}

impl Window {
    /// Creates a window.
    pub const fn new(col_off: i64, row_off: i64, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Pixel window covering `bounds` in a raster with `transform`.
    ///
    /// Offsets and sizes are rounded to the nearest pixel so that tile
    /// bounds computed in floating point land on whole pixels.
    ///
    /// # Errors
    ///
    /// Returns [`MosaicError::ProfileComputation`] for rotated transforms or
    /// empty bounds.
    pub fn from_bounds(bounds: &MercatorBounds, transform: &AffineTransform) -> Result<Self> {
        if !transform.is_north_up() {
            return Err(MosaicError::ProfileComputation(
                "windows require a north-up transform".to_string(),
            ));
        }
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(MosaicError::ProfileComputation(format!(
                "empty bounds {:?}",
                bounds
            )));
        }

        let col_off = ((bounds.left - transform.c) / transform.a).round() as i64;
        let row_off = ((bounds.top - transform.f) / transform.e).round() as i64;
        let width = (bounds.width() / transform.pixel_width()).round() as usize;
        let height = (bounds.height() / transform.pixel_height()).round() as usize;

        Ok(Self::new(col_off, row_off, width, height))
    }

    /// Whether the window lies entirely within a `width × height` raster.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.col_off >= 0
            && self.row_off >= 0
            && self.col_off as usize + self.width <= width
            && self.row_off as usize + self.height <= height
    }

    /// Whether two windows share at least one pixel.
    pub fn intersects(&self, other: &Window) -> bool {
        let right = self.col_off + self.width as i64;
        let bottom = self.row_off + self.height as i64;
        let other_right = other.col_off + other.width as i64;
        let other_bottom = other.row_off + other.height as i64;
        self.col_off < other_right
            && other.col_off < right
            && self.row_off < other_bottom
            && other.row_off < bottom
    }
}
