//! Super-resolution tile assembly.
//!
//! Stitches the `4^d` leaf tiles of a root tile into one dense buffer of
//! shape `(channels, 2^d·tile_size, 2^d·tile_size)`. A leaf at grid position
//! `(row, col)` occupies rows `row·tile_size..(row+1)·tile_size` and columns
//! `col·tile_size..(col+1)·tile_size`. Every grid cell must be filled exactly
//! once before the buffer is released.

use ndarray::{s, Array3};
use tracing::debug;

use crate::coord::{expand_quadtree, GridPosition, TileCoord};
use crate::error::{MosaicError, Result};
use crate::source::{BandIndexes, RasterSource};

/// Accumulates leaf tiles into a super-resolution buffer.
///
/// # Example
///
/// ```ignore
/// let mut assembler = SuperTileAssembler::new(3, 256, 2);
/// for (leaf, position) in expand_quadtree(root, 19)? {
///     assembler.place(position, &source.fetch(&leaf, &indexes, 256)?)?;
/// }
/// let buffer = assembler.finish()?;
/// ```
#[derive(Debug)]
pub struct SuperTileAssembler {
    buffer: Array3<f32>,
    tile_size: usize,
    grid_side: u32,
    placed: Vec<bool>,
    placed_count: usize,
}

impl SuperTileAssembler {
    /// Creates a zero-filled buffer for a grid of `2^depth × 2^depth` tiles.
    ///
    /// # Arguments
    ///
    /// * `channels` - Channels per leaf tile
    /// * `tile_size` - Leaf tile edge in pixels
    /// * `depth` - Zoom levels between the root and its leaves
    pub fn new(channels: usize, tile_size: usize, depth: u8) -> Self {
        let grid_side = 1u32 << depth;
        let edge = grid_side as usize * tile_size;
        let cells = (grid_side as usize) * (grid_side as usize);
        Self {
            buffer: Array3::zeros((channels, edge, edge)),
            tile_size,
            grid_side,
            placed: vec![false; cells],
            placed_count: 0,
        }
    }

    /// `(channels, height, width)` of the finished buffer.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.buffer.dim()
    }

    /// Number of leaves placed so far.
    pub fn placed(&self) -> usize {
        self.placed_count
    }

    /// Number of leaves required for full coverage.
    pub fn expected(&self) -> usize {
        self.placed.len()
    }

    /// Copies one leaf into its grid cell.
    ///
    /// # Errors
    ///
    /// * [`MosaicError::ShapeMismatch`] if the leaf is not
    ///   `(channels, tile_size, tile_size)`
    /// * [`MosaicError::ProfileComputation`] if the position is outside the
    ///   grid or already filled
    pub fn place(&mut self, position: GridPosition, leaf: &Array3<f32>) -> Result<()> {
        let (channels, _, _) = self.buffer.dim();
        let expected = (channels, self.tile_size, self.tile_size);
        if leaf.dim() != expected {
            return Err(MosaicError::shape_mismatch(
                format!("leaf at {}", position),
                expected,
                leaf.dim(),
            ));
        }

        if position.row >= self.grid_side || position.col >= self.grid_side {
            return Err(MosaicError::ProfileComputation(format!(
                "grid position {} outside {}x{} grid",
                position, self.grid_side, self.grid_side
            )));
        }

        let cell = (position.row * self.grid_side + position.col) as usize;
        if self.placed[cell] {
            return Err(MosaicError::ProfileComputation(format!(
                "grid position {} placed twice",
                position
            )));
        }

        let ts = self.tile_size;
        let (r, c) = (position.row as usize, position.col as usize);
        self.buffer
            .slice_mut(s![.., r * ts..(r + 1) * ts, c * ts..(c + 1) * ts])
            .assign(leaf);

        self.placed[cell] = true;
        self.placed_count += 1;
        Ok(())
    }

    /// Returns the buffer once every cell has been filled.
    pub fn finish(self) -> Result<Array3<f32>> {
        if self.placed_count != self.expected() {
            return Err(MosaicError::IncompleteMosaic {
                expected: self.expected(),
                placed: self.placed_count,
            });
        }
        Ok(self.buffer)
    }
}

/// Fetches every leaf of `tile` at `desired_zoom` and assembles them.
///
/// The returned buffer is `(indexes.len(), 2^d·tile_size, 2^d·tile_size)`
/// with `d = desired_zoom - tile.z`.
pub fn build_super_tile<S: RasterSource + ?Sized>(
    source: &S,
    tile: &TileCoord,
    desired_zoom: u8,
    indexes: &BandIndexes,
    tile_size: usize,
) -> Result<Array3<f32>> {
    let leaves = expand_quadtree(*tile, desired_zoom)?;
    let depth = desired_zoom - tile.z();
    let mut assembler = SuperTileAssembler::new(indexes.len(), tile_size, depth);

    for (leaf, position) in &leaves {
        let pixels = source.fetch(leaf, indexes, tile_size)?;
        assembler.place(*position, &pixels)?;
    }

    debug!(
        tile = %tile,
        leaves = leaves.len(),
        source = source.name(),
        "Assembled super tile"
    );
    assembler.finish()
}
