//! Inference bridge.
//!
//! An [`InferenceBridge`] maps a batch of assembled super tiles
//! `[N, C, H, W]` to a batch of results `[N, C', H', W']`. The orchestrator
//! only sees this contract; model internals live behind it.
//!
//! - [`Passthrough`] returns its input and declares no output channel count,
//!   so the mosaic keeps the source's band count.
//! - [`FirstBandModel`] is an in-process model described by a JSON model
//!   dictionary.
//! - [`RestInference`] posts batches to a model-serving REST endpoint.

mod model;
mod rest;

pub use model::{FirstBandModel, ModelDescriptor};
pub use rest::{RestInference, DEFAULT_INFERENCE_TIMEOUT_SECS};

use std::time::Duration;

use ndarray::Array4;

use crate::error::Result;

/// Turns a batch of super tiles into a batch of model outputs.
pub trait InferenceBridge: Send + Sync {
    /// Runs the model on `[N, C, H, W]` and returns `[N, C', H', W']`.
    fn predict_batch(&self, batch: Array4<f32>) -> Result<Array4<f32>>;

    /// Channel count of the outputs, if the bridge changes it.
    fn output_channels(&self) -> Option<usize>;

    /// Rough time to process `tiles` super tiles.
    fn estimate_time(&self, _tiles: usize) -> Duration {
        Duration::ZERO
    }

    /// Short name used in log messages.
    fn name(&self) -> &str;
}

impl InferenceBridge for Box<dyn InferenceBridge> {
    fn predict_batch(&self, batch: Array4<f32>) -> Result<Array4<f32>> {
        (**self).predict_batch(batch)
    }

    fn output_channels(&self) -> Option<usize> {
        (**self).output_channels()
    }

    fn estimate_time(&self, tiles: usize) -> Duration {
        (**self).estimate_time(tiles)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Bridge that performs no inference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl InferenceBridge for Passthrough {
    fn predict_batch(&self, batch: Array4<f32>) -> Result<Array4<f32>> {
        Ok(batch)
    }

    fn output_channels(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
