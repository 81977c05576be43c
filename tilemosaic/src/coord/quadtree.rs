//! Quadtree expansion of a root tile into its leaf tiles.
//!
//! A root tile at zoom `z` covers `4^d` tiles at zoom `z + d`. The expander
//! walks the quadtree breadth-first and records, for every leaf, its
//! position in the `2^d × 2^d` grid beneath the root. The assembler uses
//! those positions verbatim to place leaf pixels.
//!
//! # Ordering
//!
//! Children are visited north-west, north-east, south-east, south-west
//! (`(row, col)` offsets `(0,0), (0,1), (1,1), (1,0)`), one level at a time.
//! For `d = 1` the output is therefore:
//!
//! ```text
//! index 0 → (0,0)   index 1 → (0,1)
//! index 3 → (1,0)   index 2 → (1,1)
//! ```

use std::collections::VecDeque;
use std::fmt;

use super::types::TileCoord;
use crate::error::{MosaicError, Result};

/// `(row, col)` offsets of a tile's four children, in visiting order.
pub const QUADRANT_OFFSETS: [(u32, u32); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

/// Position of a leaf tile within its root's subdivision grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPosition {
    pub row: u32,
    pub col: u32,
}

impl GridPosition {
    /// Creates a grid position.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Expands `root` into every tile at `desired_zoom` beneath it.
///
/// Returns `4^(desired_zoom - root.z)` pairs of leaf tile and grid position.
/// `desired_zoom == root.z` yields the root itself at `(0, 0)`.
///
/// # Errors
///
/// Returns [`MosaicError::ProfileComputation`] if `desired_zoom` is coarser
/// than the root, and [`MosaicError::InvalidTile`] if it exceeds the
/// maximum zoom.
pub fn expand_quadtree(root: TileCoord, desired_zoom: u8) -> Result<Vec<(TileCoord, GridPosition)>> {
    if desired_zoom < root.z() {
        return Err(MosaicError::ProfileComputation(format!(
            "desired zoom {} is coarser than root tile {}",
            desired_zoom, root
        )));
    }
    if desired_zoom > super::MAX_ZOOM {
        return Err(MosaicError::InvalidTile {
            x: root.x(),
            y: root.y(),
            z: desired_zoom,
        });
    }

    let depth = u32::from(desired_zoom - root.z());
    let leaf_count = 4usize.pow(depth);

    let mut queue = VecDeque::with_capacity(leaf_count);
    queue.push_back((root, GridPosition::new(0, 0)));

    // Tiles of one level always precede the next level in a FIFO, so popping
    // until the front reaches the leaf zoom reproduces level-by-level order.
    while let Some((tile, position)) = queue.pop_front() {
        if tile.z() == desired_zoom {
            queue.push_front((tile, position));
            break;
        }
        for (child, (row_offset, col_offset)) in tile.children().into_iter().zip(QUADRANT_OFFSETS) {
            queue.push_back((
                child,
                GridPosition::new(position.row * 2 + row_offset, position.col * 2 + col_offset),
            ));
        }
    }

    debug_assert_eq!(queue.len(), leaf_count);
    Ok(queue.into())
}
