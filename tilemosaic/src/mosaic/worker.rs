//! Tile processing and the execution loops that drive it.
//!
//! Fetch, assembly and inference happen in [`TileProcessor`]. The loops
//! below hand its output to a write callback that always runs on the calling
//! thread, so the dataset never leaves its owner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use ndarray::{Array3, ArrayView3, Axis};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::assembler::build_super_tile;
use crate::config::MosaicConfig;
use crate::coord::TileCoord;
use crate::error::{MosaicError, Result};
use crate::geo::{MosaicProfile, Window};
use crate::inference::InferenceBridge;
use crate::source::RasterSource;

/// A block ready to be written, with its target window.
pub(crate) type WriteBlock = (Window, Array3<f32>);

/// Turns intermediate tiles into blocks ready to write.
pub(crate) struct TileProcessor<'a, S: ?Sized, B: ?Sized> {
    pub source: &'a S,
    pub bridge: &'a B,
    pub config: &'a MosaicConfig,
    pub profile: &'a MosaicProfile,
}

impl<S, B> TileProcessor<'_, S, B>
where
    S: RasterSource + ?Sized,
    B: InferenceBridge + ?Sized,
{
    /// Builds, infers and windows one batch of intermediate tiles.
    pub fn process_batch(&self, tiles: &[TileCoord]) -> Result<Vec<WriteBlock>> {
        let super_tiles = tiles
            .iter()
            .map(|tile| {
                build_super_tile(
                    self.source,
                    tile,
                    self.config.super_res_zoom,
                    &self.config.indexes,
                    self.config.tile_size,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let views: Vec<ArrayView3<'_, f32>> = super_tiles.iter().map(|t| t.view()).collect();
        let batch = ndarray::stack(Axis(0), &views)
            .map_err(|e| MosaicError::Inference(format!("cannot batch super tiles: {}", e)))?;
        drop(views);
        drop(super_tiles);

        let output = self.bridge.predict_batch(batch)?;
        if output.len_of(Axis(0)) != tiles.len() {
            return Err(MosaicError::Inference(format!(
                "{} returned {} results for {} tiles",
                self.bridge.name(),
                output.len_of(Axis(0)),
                tiles.len()
            )));
        }

        let dtype = self.profile.dtype;
        tiles
            .iter()
            .zip(output.axis_iter(Axis(0)))
            .map(|(tile, result)| {
                let window = Window::from_bounds(&tile.xy_bounds(), &self.profile.transform)?;
                let expected = (self.profile.count, window.height, window.width);
                if result.dim() != expected {
                    return Err(MosaicError::shape_mismatch(
                        format!("output of tile {}", tile),
                        expected,
                        result.dim(),
                    ));
                }
                trace!(tile = %tile, window = ?window, "Prepared block");
                Ok((window, result.mapv(|v| dtype.cast(v))))
            })
            .collect()
    }
}

/// Processes tiles one at a time on the calling thread.
///
/// Returns the number of blocks written.
pub(crate) fn run_sequential<S, B, W>(
    processor: &TileProcessor<'_, S, B>,
    tiles: &[TileCoord],
    mut write: W,
) -> Result<usize>
where
    S: RasterSource + ?Sized,
    B: InferenceBridge + ?Sized,
    W: FnMut(Window, Array3<f32>) -> Result<()>,
{
    let mut written = 0;
    for (i, tile) in tiles.iter().enumerate() {
        for (window, block) in processor.process_batch(std::slice::from_ref(tile))? {
            write(window, block)?;
            written += 1;
        }
        debug!(tile = %tile, done = i + 1, total = tiles.len(), "Wrote intermediate tile");
    }
    Ok(written)
}

/// Processes tiles on `workers` scoped threads, writing on the calling thread.
///
/// A feeder thread pushes batches of `batch_size` tiles into a bounded
/// queue shared by the workers. Finished blocks come back over a bounded
/// channel in completion order. The first error raises the abort flag and
/// is returned once every thread has stopped.
pub(crate) fn run_pool<S, B, W>(
    processor: &TileProcessor<'_, S, B>,
    tiles: &[TileCoord],
    workers: usize,
    batch_size: usize,
    mut write: W,
) -> Result<usize>
where
    S: RasterSource + ?Sized,
    B: InferenceBridge + ?Sized,
    W: FnMut(Window, Array3<f32>) -> Result<()>,
{
    let workers = workers.max(1);
    let batch_size = batch_size.max(1);
    let abort = AtomicBool::new(false);

    let (task_tx, task_rx) = mpsc::sync_channel::<&[TileCoord]>(workers * 2);
    let task_rx = Arc::new(Mutex::new(task_rx));
    let (result_tx, result_rx) = mpsc::sync_channel::<Result<Vec<WriteBlock>>>(workers);

    thread::scope(|scope| {
        let abort = &abort;

        scope.spawn(move || {
            for batch in tiles.chunks(batch_size) {
                if abort.load(Ordering::Relaxed) || task_tx.send(batch).is_err() {
                    break;
                }
            }
        });

        for worker_id in 0..workers {
            let task_rx = Arc::clone(&task_rx);
            let result_tx = result_tx.clone();
            scope.spawn(move || loop {
                let batch = match task_rx.lock().recv() {
                    Ok(batch) => batch,
                    Err(_) => break,
                };
                if abort.load(Ordering::Relaxed) {
                    break;
                }

                trace!(worker = worker_id, tiles = batch.len(), "Processing batch");
                let result = processor.process_batch(batch);
                let failed = result.is_err();
                if result_tx.send(result).is_err() || failed {
                    break;
                }
            });
        }

        // Workers hold the only remaining handles, so the feeder and the
        // result loop both see disconnects once every worker has exited.
        drop(task_rx);
        drop(result_tx);

        let mut written = 0;
        for result in result_rx {
            let outcome = result.and_then(|blocks| {
                for (window, block) in blocks {
                    write(window, block)?;
                    written += 1;
                }
                Ok(())
            });
            if let Err(e) = outcome {
                abort.store(true, Ordering::Relaxed);
                return Err(e);
            }
            debug!(written, total = tiles.len(), "Wrote batch");
        }
        Ok(written)
    })
}
