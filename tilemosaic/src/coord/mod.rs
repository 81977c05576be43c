//! Web Mercator tile coordinates.
//!
//! Provides the [`TileCoord`] address type, conversions between geographic
//! coordinates (longitude/latitude) and tiles, bounding-box tile listing, and
//! the quadtree expansion used to build super-resolution tiles.

mod quadtree;
mod types;

pub use quadtree::{expand_quadtree, GridPosition, QUADRANT_OFFSETS};
pub use types::{
    MercatorBounds, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, ORIGIN_SHIFT,
};

use std::f64::consts::PI;

use crate::error::{MosaicError, Result};

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `zoom` - Zoom level (0 to 30)
///
/// Points on the east or south edge of the world are clamped into the last
/// tile rather than falling off the grid.
#[inline]
pub fn to_tile_coords(lon: f64, lat: f64, zoom: u8) -> Result<TileCoord> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) || !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(MosaicError::Config(format!(
            "coordinate ({}, {}) outside Web Mercator range",
            lon, lat
        )));
    }
    if zoom > MAX_ZOOM {
        return Err(MosaicError::InvalidTile { x: 0, y: 0, z: zoom });
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (1u64 << zoom) - 1;

    let x = (((lon + 180.0) / 360.0 * n) as u64).min(max_index) as u32;

    let lat_rad = lat * PI / 180.0;
    let y = (((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u64).min(max_index) as u32;

    TileCoord::new(x, y, zoom)
}

/// Returns the (longitude, latitude) of the tile's north-west corner.
#[inline]
pub fn tile_to_lon_lat(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.z() as i32);

    let lon = tile.x() as f64 / n * 360.0 - 180.0;

    let y = tile.y() as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lon, lat)
}

/// Lists every tile at `zoom` intersecting a longitude/latitude box.
///
/// Latitudes are clamped to the Web Mercator range. Tiles are returned
/// row by row, west to east, north to south.
pub fn tiles_in_bounds(
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    zoom: u8,
) -> Result<Vec<TileCoord>> {
    if west > east || south > north {
        return Err(MosaicError::Config(format!(
            "inverted bounds: west={} south={} east={} north={}",
            west, south, east, north
        )));
    }

    let south = south.clamp(MIN_LAT, MAX_LAT);
    let north = north.clamp(MIN_LAT, MAX_LAT);
    let west = west.clamp(MIN_LON, MAX_LON);
    let east = east.clamp(MIN_LON, MAX_LON);

    let upper_left = to_tile_coords(west, north, zoom)?;
    let lower_right = to_tile_coords(east, south, zoom)?;

    let mut tiles = Vec::with_capacity(
        ((lower_right.x() - upper_left.x() + 1) * (lower_right.y() - upper_left.y() + 1)) as usize,
    );
    for y in upper_left.y()..=lower_right.y() {
        for x in upper_left.x()..=lower_right.x() {
            tiles.push(TileCoord::new(x, y, zoom)?);
        }
    }
    Ok(tiles)
}
