//! Raster grid storage and whole-grid pixel operations
//!
//! Every layer in the model shares one fixed shape established by the first
//! input raster. Grids are row-major with the origin at the top-left; a
//! one-pixel border ring is reserved and never urbanized, and reads outside
//! the grid resolve to zero so border neighbours count as empty.

use ndarray::Array2;
use num_traits::Zero;

use crate::spatial::neighbors::NEIGHBOR_OFFSETS;

/// 8-bit raster cell: land-use class, urbanization phase, colour index, or
/// slope percentage depending on the grid role
pub type Pixel = u8;

/// Unsigned pixel predicate selector
///
/// Replaces integer comparison opcodes with one variant per operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Strictly less than
    Lt,
    /// Less than or equal
    Le,
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Greater than or equal
    Ge,
    /// Strictly greater than
    Gt,
}

impl Comparator {
    /// Evaluate the predicate `lhs OP rhs`
    pub fn matches<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Ge => lhs >= rhs,
            Self::Gt => lhs > rhs,
        }
    }
}

/// Fixed-shape 2-D raster over a copyable cell type
///
/// `ValueGrid<u8>` carries every model layer; `ValueGrid<u32>` accumulates
/// per-pixel urbanization counts across Monte Carlo replications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueGrid<T> {
    data: Array2<T>,
}

/// The 8-bit grid used for all model layers
pub type PixelGrid = ValueGrid<Pixel>;

impl<T: Copy + PartialOrd + Zero> ValueGrid<T> {
    /// Create a zero-filled grid of the given shape
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            data: Array2::from_elem((nrows, ncols), T::zero()),
        }
    }

    /// Wrap an existing array
    pub const fn from_array(data: Array2<T>) -> Self {
        Self { data }
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Total cell count (`nrows * ncols`)
    pub fn total_pixels(&self) -> usize {
        self.data.len()
    }

    /// Grid shape as (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Whether (i, j) lies on the reserved one-pixel border ring
    pub fn on_border(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i + 1 >= self.nrows() || j + 1 >= self.ncols()
    }

    /// Read a cell; out-of-bounds coordinates read as zero
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data.get([i, j]).copied().unwrap_or_else(T::zero)
    }

    /// Write a cell; out-of-bounds coordinates are ignored
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        if let Some(cell) = self.data.get_mut([i, j]) {
            *cell = value;
        }
    }

    /// Set every cell to `value`
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Blit `source` into this grid
    ///
    /// Both grids must share the model shape.
    pub fn copy_from(&mut self, source: &Self) {
        debug_assert_eq!(self.dim(), source.dim());
        self.data.assign(&source.data);
    }

    /// For every cell where `source[i] OP value`, set this grid's cell to
    /// `set_value`; non-matching cells are left untouched
    pub fn conditional_set(&mut self, source: &Self, cmp: Comparator, value: T, set_value: T) {
        debug_assert_eq!(self.dim(), source.dim());
        for (cell, &src) in self.data.iter_mut().zip(source.data.iter()) {
            if cmp.matches(src, value) {
                *cell = set_value;
            }
        }
    }

    /// Count cells satisfying `cell OP value`
    pub fn count(&self, cmp: Comparator, value: T) -> usize {
        self.data.iter().filter(|&&p| cmp.matches(p, value)).count()
    }

    /// Count the eight neighbours of (i, j) satisfying `neighbour OP value`
    ///
    /// Neighbours outside the grid read as zero and are tested like any
    /// other cell, which keeps the border discipline uniform.
    pub fn count_neighbors(&self, i: usize, j: usize, cmp: Comparator, value: T) -> usize {
        NEIGHBOR_OFFSETS
            .iter()
            .filter(|&&(di, dj)| {
                let ni = i.wrapping_add_signed(di as isize);
                let nj = j.wrapping_add_signed(dj as isize);
                let neighbor = self.data.get([ni, nj]).copied().unwrap_or_else(T::zero);
                cmp.matches(neighbor, value)
            })
            .count()
    }

    /// Count indices where both grids hold the same value
    pub fn intersection_count(&self, other: &Self) -> usize {
        debug_assert_eq!(self.dim(), other.dim());
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|(a, b)| a == b)
            .count()
    }

    /// Overlay `top` onto this grid: wherever `top` is non-zero its value
    /// wins, elsewhere this grid's value is kept
    pub fn overlay_with(&mut self, top: &Self) {
        debug_assert_eq!(self.dim(), top.dim());
        for (cell, &t) in self.data.iter_mut().zip(top.data.iter()) {
            if t > T::zero() {
                *cell = t;
            }
        }
    }

    /// Cell-wise maximum with `other`, in place
    ///
    /// The end-of-year merge of the delta grid into Z; urbanization is
    /// monotone because no cell ever decreases.
    pub fn merge_max(&mut self, other: &Self) {
        debug_assert_eq!(self.dim(), other.dim());
        for (cell, &o) in self.data.iter_mut().zip(other.data.iter()) {
            if o > *cell {
                *cell = o;
            }
        }
    }

    /// Iterate cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied()
    }

    /// Iterate `((row, col), value)` in row-major order
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize), T)> + '_ {
        self.data.indexed_iter().map(|(idx, &v)| (idx, v))
    }

    /// Borrow the backing array
    pub const fn array(&self) -> &Array2<T> {
        &self.data
    }
}

/// One half-open bucket of a remap table
#[derive(Debug, Clone, Copy)]
pub struct RemapInterval {
    /// Inclusive lower bound
    pub lower: Pixel,
    /// Inclusive upper bound
    pub upper: Pixel,
    /// Replacement value for pixels inside the bucket
    pub index: Pixel,
}

/// Ordered interval table mapping pixel ranges to replacement indices
///
/// The first matching interval wins; pixels matching no interval pass
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    intervals: Vec<RemapInterval>,
}

impl RemapTable {
    /// Build a table from intervals in priority order
    pub const fn new(intervals: Vec<RemapInterval>) -> Self {
        Self { intervals }
    }

    /// Map a single pixel through the table
    pub fn map(&self, pixel: Pixel) -> Pixel {
        self.intervals
            .iter()
            .find(|iv| pixel >= iv.lower && pixel <= iv.upper)
            .map_or(pixel, |iv| iv.index)
    }

    /// Number of intervals in the table
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the table has no intervals
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl PixelGrid {
    /// Remap every pixel through `table` into `out`
    pub fn remap(&self, table: &RemapTable, out: &mut Self) {
        debug_assert_eq!(self.dim(), out.dim());
        for (dst, &src) in out.data.iter_mut().zip(self.data.iter()) {
            *dst = table.map(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe_grid() -> PixelGrid {
        let mut g = PixelGrid::new(4, 4);
        for j in 0..4 {
            g.set(1, j, 10);
            g.set(2, j, 20);
        }
        g
    }

    #[test]
    fn comparator_covers_all_six_operators() {
        assert!(Comparator::Lt.matches(1u8, 2));
        assert!(Comparator::Le.matches(2u8, 2));
        assert!(Comparator::Eq.matches(2u8, 2));
        assert!(Comparator::Ne.matches(1u8, 2));
        assert!(Comparator::Ge.matches(2u8, 2));
        assert!(Comparator::Gt.matches(3u8, 2));
        assert!(!Comparator::Gt.matches(2u8, 2));
    }

    #[test]
    fn conditional_set_leaves_non_matching_pixels() {
        let source = stripe_grid();
        let mut target = PixelGrid::new(4, 4);
        target.fill(7);
        target.conditional_set(&source, Comparator::Ge, 20, 1);
        assert_eq!(target.get(2, 0), 1);
        assert_eq!(target.get(1, 0), 7);
        assert_eq!(target.get(0, 0), 7);
    }

    #[test]
    fn count_uses_unsigned_comparison() {
        let g = stripe_grid();
        assert_eq!(g.count(Comparator::Gt, 0), 8);
        assert_eq!(g.count(Comparator::Eq, 10), 4);
        assert_eq!(g.count(Comparator::Lt, 10), 8);
    }

    #[test]
    fn neighbor_count_treats_out_of_bounds_as_zero() {
        let mut g = PixelGrid::new(3, 3);
        g.fill(5);
        // Corner pixel has three in-bounds neighbours; the five
        // out-of-bounds reads are zero and fail a Gt-0 test.
        assert_eq!(g.count_neighbors(0, 0, Comparator::Gt, 0), 3);
        assert_eq!(g.count_neighbors(0, 0, Comparator::Eq, 0), 5);
        assert_eq!(g.count_neighbors(1, 1, Comparator::Gt, 0), 8);
    }

    #[test]
    fn overlay_identity_and_idempotence() {
        let a = stripe_grid();
        let zero = PixelGrid::new(4, 4);

        let mut out = a.clone();
        out.overlay_with(&zero);
        assert_eq!(out, a);

        let mut out = a.clone();
        out.overlay_with(&a);
        assert_eq!(out, a);
    }

    #[test]
    fn merge_max_never_decreases() {
        let mut z = stripe_grid();
        let mut delta = PixelGrid::new(4, 4);
        delta.set(0, 0, 4);
        delta.set(1, 0, 4);
        z.merge_max(&delta);
        assert_eq!(z.get(0, 0), 4);
        // Existing value 10 beats the delta phase colour 4.
        assert_eq!(z.get(1, 0), 10);
    }

    #[test]
    fn intersection_counts_equal_pixels() {
        let a = stripe_grid();
        let mut b = stripe_grid();
        assert_eq!(a.intersection_count(&b), 16);
        b.set(1, 1, 99);
        assert_eq!(a.intersection_count(&b), 15);
    }

    #[test]
    fn remap_first_match_wins_else_passthrough() {
        let table = RemapTable::new(vec![
            RemapInterval {
                lower: 1,
                upper: 50,
                index: 200,
            },
            RemapInterval {
                lower: 40,
                upper: 100,
                index: 201,
            },
        ]);
        assert_eq!(table.map(45), 200);
        assert_eq!(table.map(60), 201);
        assert_eq!(table.map(0), 0);
        assert_eq!(table.map(120), 120);
    }

    #[test]
    fn border_ring_detection() {
        let g = PixelGrid::new(4, 5);
        assert!(g.on_border(0, 2));
        assert!(g.on_border(3, 2));
        assert!(g.on_border(2, 0));
        assert!(g.on_border(2, 4));
        assert!(!g.on_border(1, 1));
        assert!(!g.on_border(2, 3));
    }
}
