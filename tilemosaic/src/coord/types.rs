//! Coordinate type definitions

use std::fmt;

use crate::error::{MosaicError, Result};

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Deepest zoom level whose tile indices fit in a `u32` grid.
pub const MAX_ZOOM: u8 = 30;

/// Half the Web Mercator world extent in meters (π · 6378137).
pub const ORIGIN_SHIFT: f64 = 20037508.342789244;

/// Tile address in the Web Mercator / Slippy Map scheme.
///
/// `x` grows eastward and `y` grows southward, both in `0..2^z`.
/// Values are validated on construction and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    x: u32,
    y: u32,
    z: u8,
}

impl TileCoord {
    /// Creates a tile coordinate, checking `0 ≤ x, y < 2^z`.
    pub fn new(x: u32, y: u32, z: u8) -> Result<Self> {
        if z > MAX_ZOOM {
            return Err(MosaicError::InvalidTile { x, y, z });
        }
        let n = 1u64 << z;
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(MosaicError::InvalidTile { x, y, z });
        }
        Ok(Self { x, y, z })
    }

    /// Tile column.
    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Tile row.
    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Zoom level.
    #[inline]
    pub fn z(&self) -> u8 {
        self.z
    }

    /// The four children one zoom level down, in quadtree order:
    /// north-west, north-east, south-east, south-west.
    ///
    /// Panics if the tile is already at [`MAX_ZOOM`].
    #[inline]
    pub fn children(&self) -> [TileCoord; 4] {
        assert!(self.z < MAX_ZOOM, "tile {} has no children", self);
        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        [
            TileCoord { x, y, z },
            TileCoord { x: x + 1, y, z },
            TileCoord { x: x + 1, y: y + 1, z },
            TileCoord { x, y: y + 1, z },
        ]
    }

    /// Projected (EPSG:3857) bounds of the tile in meters.
    pub fn xy_bounds(&self) -> MercatorBounds {
        let tile_size = 2.0 * ORIGIN_SHIFT / (1u64 << self.z) as f64;
        let left = self.x as f64 * tile_size - ORIGIN_SHIFT;
        let top = ORIGIN_SHIFT - self.y as f64 * tile_size;
        MercatorBounds {
            left,
            bottom: top - tile_size,
            right: left + tile_size,
            top,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Axis-aligned bounding box in Web Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl MercatorBounds {
    /// Width in meters.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height in meters.
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}
