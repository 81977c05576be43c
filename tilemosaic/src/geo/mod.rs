//! Georeferencing for the output mosaic.
//!
//! Converts tiles and zoom levels into affine transforms, pixel windows and
//! the [`MosaicProfile`] handed to the output raster writer.

mod profile;
mod transform;

pub use profile::{
    create_webmercator_profile, Compression, DataType, Interleave, MosaicProfile,
    DEFAULT_BLOCK_SIZE, MOSAIC_CRS, MOSAIC_EPSG,
};
pub use transform::{meters_per_pixel, zoom_tile_transform, AffineTransform, Window, DEFAULT_PADDING, TILE_PIXELS};
