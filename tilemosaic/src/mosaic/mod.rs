//! Mosaic orchestration.
//!
//! [`MosaicOrchestrator`] drives one build for one root tile:
//!
//! 1. computes the output profile at the super-resolution pixel size
//! 2. opens the output dataset once
//! 3. for every intermediate tile under the root: expands it to leaves,
//!    fetches and assembles them, runs inference, and writes the result into
//!    the window of the intermediate tile's footprint
//! 4. closes the dataset
//!
//! # Example
//!
//! ```ignore
//! use tilemosaic::config::{ExecutionMode, MosaicConfig};
//! use tilemosaic::dataset::MemoryDataset;
//! use tilemosaic::mosaic::MosaicOrchestrator;
//!
//! let config = MosaicConfig::default().with_execution(ExecutionMode::worker_pool());
//! let mut orchestrator = MosaicOrchestrator::new(source, root, config)?;
//! let dataset = orchestrator.run(MemoryDataset::create)?;
//! ```

mod state;
mod worker;

pub use state::OrchestratorState;

use std::time::Instant;

use ndarray::Array3;
use tracing::{debug, error, info, warn};

use crate::config::{ExecutionMode, MosaicConfig};
use crate::coord::{expand_quadtree, TileCoord};
use crate::dataset::RasterDataset;
use crate::error::{MosaicError, Result};
use crate::geo::{create_webmercator_profile, DataType, MosaicProfile, Window, TILE_PIXELS};
use crate::inference::{InferenceBridge, Passthrough};
use crate::source::RasterSource;
use worker::{run_pool, run_sequential, TileProcessor};

/// Builds the mosaic of one root tile.
///
/// The source variant is fixed by `S` when the orchestrator is created;
/// pass a `Box<dyn RasterSource>` to choose it at runtime.
pub struct MosaicOrchestrator<S: RasterSource, B: InferenceBridge = Passthrough> {
    source: S,
    bridge: B,
    root: TileCoord,
    config: MosaicConfig,
    state: OrchestratorState,
    profile: Option<MosaicProfile>,
    written: usize,
}

impl<S: RasterSource> MosaicOrchestrator<S, Passthrough> {
    /// Creates an orchestrator without inference.
    ///
    /// # Errors
    ///
    /// Returns [`MosaicError::ProfileComputation`] if the zoom levels are not
    /// ordered `root ≤ intermediate ≤ super-resolution`, and
    /// [`MosaicError::Config`] for invalid pool or tile settings.
    pub fn new(source: S, root: TileCoord, config: MosaicConfig) -> Result<Self> {
        config.validate()?;
        if root.z() > config.intermediate_zoom {
            return Err(MosaicError::ProfileComputation(format!(
                "root tile {} is finer than intermediate zoom {}",
                root, config.intermediate_zoom
            )));
        }
        if config.tile_size != TILE_PIXELS {
            return Err(MosaicError::ProfileComputation(format!(
                "tile size {} does not match the {}-pixel web-mercator grid",
                config.tile_size, TILE_PIXELS
            )));
        }

        Ok(Self {
            source,
            bridge: Passthrough,
            root,
            config,
            state: OrchestratorState::Created,
            profile: None,
            written: 0,
        })
    }
}

impl<S: RasterSource, B: InferenceBridge> MosaicOrchestrator<S, B> {
    /// Replaces the inference bridge.
    pub fn with_inference<B2: InferenceBridge>(self, bridge: B2) -> MosaicOrchestrator<S, B2> {
        MosaicOrchestrator {
            source: self.source,
            bridge,
            root: self.root,
            config: self.config,
            state: self.state,
            profile: None,
            written: self.written,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn root(&self) -> &TileCoord {
        &self.root
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// Number of windows written by the last run.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Output profile, once computed.
    pub fn profile(&self) -> Option<&MosaicProfile> {
        self.profile.as_ref()
    }

    /// Intermediate tiles under the root, in quadtree order.
    pub fn intermediate_tiles(&self) -> Result<Vec<TileCoord>> {
        Ok(expand_quadtree(self.root, self.config.intermediate_zoom)?
            .into_iter()
            .map(|(tile, _)| tile)
            .collect())
    }

    /// Computes the output profile for the root tile.
    ///
    /// The channel count is the bridge's declared output channels, or the
    /// number of requested bands when the bridge declares none. Without an
    /// explicit dtype, outputs are `float32` when the bridge declares
    /// channels and `uint8` otherwise.
    pub fn compute_profile(&mut self) -> Result<&MosaicProfile> {
        let declared = self.bridge.output_channels();
        let count = declared.unwrap_or(self.config.indexes.len());
        let dtype = self.config.dtype.unwrap_or(match declared {
            Some(_) => DataType::Float32,
            None => DataType::UInt8,
        });

        let profile = create_webmercator_profile(
            &self.root,
            self.config.super_res_zoom,
            self.config.padding,
            count,
            dtype,
            self.config.nodata,
        )?;
        debug!(
            root = %self.root,
            width = profile.width,
            height = profile.height,
            count,
            dtype = %dtype,
            "Computed profile"
        );

        self.state = OrchestratorState::ProfileComputed;
        Ok(self.profile.insert(profile))
    }

    /// Runs the build, writing into the dataset returned by `open`.
    ///
    /// `open` is called once with the computed profile. On success the
    /// dataset is closed and returned. On any error the dataset is closed,
    /// the state becomes [`OrchestratorState::Failed`] and the error is
    /// returned.
    pub fn run<D, F>(&mut self, open: F) -> Result<D>
    where
        D: RasterDataset,
        F: FnOnce(&MosaicProfile) -> Result<D>,
    {
        let start = Instant::now();
        self.written = 0;

        let profile = match self.compute_profile() {
            Ok(profile) => profile.clone(),
            Err(e) => return Err(self.fail(e)),
        };
        let tiles = match self.intermediate_tiles() {
            Ok(tiles) => tiles,
            Err(e) => return Err(self.fail(e)),
        };
        let mut dataset = match open(&profile) {
            Ok(dataset) => dataset,
            Err(e) => return Err(self.fail(e)),
        };
        self.state = OrchestratorState::DatasetOpen;

        info!(
            root = %self.root,
            intermediate_zoom = self.config.intermediate_zoom,
            super_res_zoom = self.config.super_res_zoom,
            tiles = tiles.len(),
            source = self.source.name(),
            model = self.bridge.name(),
            estimate_secs = self.bridge.estimate_time(tiles.len()).as_secs_f64(),
            "Starting mosaic"
        );

        let result = self
            .write_tiles(&tiles, &profile, &mut dataset)
            .and_then(|written| dataset.close().map(|_| written));

        match result {
            Ok(written) => {
                self.written = written;
                self.state = OrchestratorState::Closed;
                info!(
                    root = %self.root,
                    written,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Mosaic complete"
                );
                Ok(dataset)
            }
            Err(e) => {
                if let Err(close_err) = dataset.close() {
                    warn!(error = %close_err, "Failed to close dataset after error");
                }
                Err(self.fail(e))
            }
        }
    }

    fn write_tiles<D: RasterDataset>(
        &mut self,
        tiles: &[TileCoord],
        profile: &MosaicProfile,
        dataset: &mut D,
    ) -> Result<usize> {
        let processor = TileProcessor {
            source: &self.source,
            bridge: &self.bridge,
            config: &self.config,
            profile,
        };
        let state = &mut self.state;
        let write = |window: Window, block: Array3<f32>| {
            *state = OrchestratorState::Writing;
            dataset.write_window(&window, block.view())
        };

        match self.config.execution {
            ExecutionMode::Sequential => run_sequential(&processor, tiles, write),
            ExecutionMode::WorkerPool {
                workers,
                batch_size,
            } => {
                debug!(workers, batch_size, "Using worker pool");
                run_pool(&processor, tiles, workers, batch_size, write)
            }
        }
    }

    fn fail(&mut self, e: MosaicError) -> MosaicError {
        error!(root = %self.root, state = %self.state, error = %e, "Mosaic failed");
        self.state = OrchestratorState::Failed;
        e
    }
}
