//! tilemosaic - super-resolution web-mercator mosaics
//!
//! Builds a georeferenced raster for one root tile by fetching the root's
//! descendants at a fine zoom level, stitching them into super tiles,
//! optionally passing the super tiles through an inference model, and writing
//! the results window by window into a tiled raster in EPSG:3857.
//!
//! # Modules
//!
//! - [`coord`] - tile coordinates and quadtree expansion
//! - [`geo`] - geotransforms, pixel windows and output profiles
//! - [`source`] - tiled-store and web tile sources
//! - [`assembler`] - super tile assembly
//! - [`inference`] - inference bridge and model clients
//! - [`dataset`] - output rasters accepting windowed writes
//! - [`mosaic`] - the orchestrator and its worker pool
//! - [`config`] - settings, INI files and factories
//! - [`logging`] - subscriber setup
//!
//! # Features
//!
//! - `gdal` - GDAL-backed tiled store reader and GeoTIFF output

pub mod assembler;
pub mod config;
pub mod coord;
pub mod dataset;
pub mod error;
pub mod geo;
pub mod inference;
pub mod logging;
pub mod mosaic;
pub mod source;

pub use config::{ExecutionMode, MosaicConfig};
pub use coord::TileCoord;
pub use error::{MosaicError, Result};
pub use mosaic::{MosaicOrchestrator, OrchestratorState};

/// Version of the tilemosaic library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
