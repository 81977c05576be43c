//! Configuration structs and their defaults.

use std::path::PathBuf;

use crate::coord::MAX_ZOOM;
use crate::error::{MosaicError, Result};
use crate::geo::{DataType, DEFAULT_PADDING};
use crate::inference::DEFAULT_INFERENCE_TIMEOUT_SECS;
use crate::source::{BandIndexes, DEFAULT_TIMEOUT_SECS};

/// Default zoom level of the tiles each write covers.
pub const DEFAULT_INTERMEDIATE_ZOOM: u8 = 17;

/// Default zoom level of the leaf tiles fetched from the source.
pub const DEFAULT_SUPER_RES_ZOOM: u8 = 19;

/// Default leaf tile edge in pixels.
pub const DEFAULT_TILE_SIZE: usize = 256;

/// Default number of worker threads in pool mode.
pub const DEFAULT_WORKERS: usize = 4;

/// Default number of intermediate tiles per worker batch.
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// How intermediate tiles are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One tile at a time on the calling thread.
    #[default]
    Sequential,
    /// `workers` threads pull batches of `batch_size` tiles; writes stay on
    /// the calling thread.
    WorkerPool { workers: usize, batch_size: usize },
}

impl ExecutionMode {
    /// Worker pool with default sizing.
    pub fn worker_pool() -> Self {
        ExecutionMode::WorkerPool {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Parameters of one mosaic build.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicConfig {
    pub intermediate_zoom: u8,
    pub super_res_zoom: u8,
    pub tile_size: usize,
    pub padding: u32,
    pub indexes: BandIndexes,
    pub nodata: f64,
    /// Output sample type; `None` picks `uint8` without inference and
    /// `float32` when the inference bridge declares its output channels.
    pub dtype: Option<DataType>,
    pub execution: ExecutionMode,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            intermediate_zoom: DEFAULT_INTERMEDIATE_ZOOM,
            super_res_zoom: DEFAULT_SUPER_RES_ZOOM,
            tile_size: DEFAULT_TILE_SIZE,
            padding: DEFAULT_PADDING,
            indexes: BandIndexes::default(),
            nodata: 0.0,
            dtype: None,
            execution: ExecutionMode::Sequential,
        }
    }
}

impl MosaicConfig {
    pub fn with_zooms(mut self, intermediate_zoom: u8, super_res_zoom: u8) -> Self {
        self.intermediate_zoom = intermediate_zoom;
        self.super_res_zoom = super_res_zoom;
        self
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_indexes(mut self, indexes: BandIndexes) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Checks zoom ordering, tile size and pool sizing.
    pub fn validate(&self) -> Result<()> {
        if self.intermediate_zoom > self.super_res_zoom {
            return Err(MosaicError::ProfileComputation(format!(
                "intermediate zoom {} is finer than super-resolution zoom {}",
                self.intermediate_zoom, self.super_res_zoom
            )));
        }
        if self.super_res_zoom > MAX_ZOOM {
            return Err(MosaicError::ProfileComputation(format!(
                "super-resolution zoom {} exceeds maximum {}",
                self.super_res_zoom, MAX_ZOOM
            )));
        }
        if self.tile_size == 0 {
            return Err(MosaicError::Config("tile size must be positive".to_string()));
        }
        if let ExecutionMode::WorkerPool { workers, batch_size } = self.execution {
            if workers == 0 || batch_size == 0 {
                return Err(MosaicError::Config(format!(
                    "worker pool needs at least one worker and one tile per batch \
                     (workers={}, batch_size={})",
                    workers, batch_size
                )));
            }
        }
        Ok(())
    }
}

/// Where leaf tiles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// XYZ tile-map service.
    Web {
        url_template: String,
        timeout_secs: u64,
    },
    /// Raster store readable by GDAL (path or `/vsi*` URI).
    Store { path: String },
}

impl SourceConfig {
    /// Web source with the default timeout.
    pub fn web(url_template: impl Into<String>) -> Self {
        SourceConfig::Web {
            url_template: url_template.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Which inference bridge to attach.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InferenceConfig {
    #[default]
    None,
    /// In-process model described by a JSON model dictionary file.
    Model { dictionary: PathBuf },
    /// REST prediction endpoint.
    Rest {
        url: String,
        output_channels: usize,
        output_size: Option<usize>,
        timeout_secs: u64,
    },
}

impl InferenceConfig {
    /// REST endpoint with one output channel and the default timeout.
    pub fn rest(url: impl Into<String>) -> Self {
        InferenceConfig::Rest {
            url: url.into(),
            output_channels: 1,
            output_size: None,
            timeout_secs: DEFAULT_INFERENCE_TIMEOUT_SECS,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: tracing::Level,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            directory: None,
        }
    }
}
