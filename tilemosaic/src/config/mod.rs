//! Configuration for mosaic builds.
//!
//! Settings can be built in code ([`MosaicConfig`] and its `with_*`
//! methods) or loaded from an INI file ([`ConfigFile`]). The factories turn
//! [`SourceConfig`] and [`InferenceConfig`] into the boxed trait objects the
//! orchestrator runs with.

mod factory;
mod file;
mod parser;
mod settings;

pub use factory::{build_inference, build_source};
pub use file::{ConfigFile, ConfigFileError};
pub use settings::{
    ExecutionMode, InferenceConfig, LoggingConfig, MosaicConfig, SourceConfig, DEFAULT_BATCH_SIZE,
    DEFAULT_INTERMEDIATE_ZOOM, DEFAULT_SUPER_RES_ZOOM, DEFAULT_TILE_SIZE, DEFAULT_WORKERS,
};
