//! Eight-neighbour offsets, random draws, and sequential scans

use rand::{Rng, rngs::StdRng};

/// The eight neighbour offsets of a cell, as `(row, col)` deltas
///
/// ```text
///    -------------------------------------
///    |0         |7          |6           |
///    | (-1,-1)  |  (-1, 0)  |  (-1, 1)   |
///    -------------------------------------
///    |1         |           |5           |
///    | ( 0,-1)  |  (i, j)   |  ( 0, 1)   |
///    -------------------------------------
///    |2         |3          |4           |
///    | ( 1,-1)  |  ( 1, 0)  |  ( 1, 1)   |
///    -------------------------------------
/// ```
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Offset at `index` (taken modulo 8)
pub const fn offset_at(index: usize) -> (i32, i32) {
    NEIGHBOR_OFFSETS[index % 8]
}

/// Apply an offset to (i, j), returning `None` when the neighbour falls
/// outside a grid of shape (nrows, ncols)
pub fn apply_offset(
    i: usize,
    j: usize,
    offset: (i32, i32),
    nrows: usize,
    ncols: usize,
) -> Option<(usize, usize)> {
    let ni = i.checked_add_signed(offset.0 as isize)?;
    let nj = j.checked_add_signed(offset.1 as isize)?;
    (ni < nrows && nj < ncols).then_some((ni, nj))
}

/// Draw one of the eight offsets uniformly
pub fn random_offset(rng: &mut StdRng) -> (i32, i32) {
    offset_at(rng.random_range(0..NEIGHBOR_OFFSETS.len()))
}

/// Draw a uniform random neighbour of (i, j), bounded by the grid shape
///
/// Returns `None` when the drawn neighbour is out of bounds; the caller
/// decides whether to redraw or give up.
pub fn random_neighbor(
    rng: &mut StdRng,
    i: usize,
    j: usize,
    nrows: usize,
    ncols: usize,
) -> Option<(usize, usize)> {
    apply_offset(i, j, random_offset(rng), nrows, ncols)
}

/// Sequential neighbour cursor owned by the caller
///
/// Walks the eight offsets in table order, remembering the last index so a
/// scan can resume where the previous one stopped. Each call site owns its
/// own cursor; there is no shared state between scans.
#[derive(Debug, Clone, Default)]
pub struct NeighborScan {
    last: usize,
}

impl NeighborScan {
    /// Create a cursor positioned at offset 0
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Position the cursor at a fixed index and return that offset
    pub const fn jump(&mut self, index: usize) -> (i32, i32) {
        self.last = index % 8;
        offset_at(self.last)
    }

    /// Advance to the next offset modulo 8 and return it
    pub const fn advance(&mut self) -> (i32, i32) {
        self.last = (self.last + 1) % 8;
        offset_at(self.last)
    }

    /// Index of the offset the cursor currently points at
    pub const fn index(&self) -> usize {
        self.last
    }
}
