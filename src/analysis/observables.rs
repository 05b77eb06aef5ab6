//! Per-year scalar observables measured on the urban extent
//!
//! Calibration compares these against the control imagery; the averaged
//! values also feed the avg/std-dev report tables. A pixel counts as urban
//! when it is non-zero, which holds for both the Z grid (phase colours and
//! seeds) and the binary control rasters.

use bitvec::prelude::*;

use crate::spatial::grid::{Comparator, PixelGrid};

/// The scalar observables recorded at every control year
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observables {
    /// Urban pixel count
    pub pop: f64,
    /// Urban pixels with at least one non-urban neighbour
    pub edges: f64,
    /// Eight-connected urban cluster count
    pub clusters: f64,
    /// Mean pixels per cluster
    pub mean_cluster_size: f64,
    /// Mean percent slope under urban pixels
    pub average_slope: f64,
    /// Urban share of the urbanizable area, in percent
    pub percent_urban: f64,
    /// Mean urban column (x of the centroid)
    pub xmean: f64,
    /// Mean urban row (y of the centroid)
    pub ymean: f64,
    /// Root mean squared distance of urban pixels from the centroid
    pub radial_spread: f64,
    /// Spatial agreement with the control mask for the same year
    pub lee_sallee: f64,
}

impl Observables {
    /// Number of scalar fields
    pub const FIELD_COUNT: usize = 10;

    /// Report column names, in `to_array` order
    pub const FIELD_NAMES: [&'static str; Self::FIELD_COUNT] = [
        "pop",
        "edges",
        "clusters",
        "cluster_size",
        "slope",
        "percent_urban",
        "xmean",
        "ymean",
        "rad",
        "leesalee",
    ];

    /// Flatten into an array ordered like [`Self::FIELD_NAMES`]
    pub const fn to_array(&self) -> [f64; Self::FIELD_COUNT] {
        [
            self.pop,
            self.edges,
            self.clusters,
            self.mean_cluster_size,
            self.average_slope,
            self.percent_urban,
            self.xmean,
            self.ymean,
            self.radial_spread,
            self.lee_sallee,
        ]
    }

    /// Rebuild from an array ordered like [`Self::FIELD_NAMES`]
    pub const fn from_array(values: [f64; Self::FIELD_COUNT]) -> Self {
        Self {
            pop: values[0],
            edges: values[1],
            clusters: values[2],
            mean_cluster_size: values[3],
            average_slope: values[4],
            percent_urban: values[5],
            xmean: values[6],
            ymean: values[7],
            radial_spread: values[8],
            lee_sallee: values[9],
        }
    }
}

/// Count eight-connected clusters of non-zero pixels
fn count_clusters(grid: &PixelGrid) -> usize {
    let (nrows, ncols) = grid.dim();
    let mut visited = bitvec![0; nrows * ncols];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut clusters = 0;

    for ((i, j), value) in grid.indexed_iter() {
        let index = i * ncols + j;
        if value == 0 || visited[index] {
            continue;
        }
        clusters += 1;
        visited.set(index, true);
        stack.push((i, j));
        while let Some((ci, cj)) = stack.pop() {
            for &(di, dj) in &crate::spatial::neighbors::NEIGHBOR_OFFSETS {
                let Some(ni) = ci.checked_add_signed(di as isize) else {
                    continue;
                };
                let Some(nj) = cj.checked_add_signed(dj as isize) else {
                    continue;
                };
                if ni >= nrows || nj >= ncols {
                    continue;
                }
                let nindex = ni * ncols + nj;
                if grid.get(ni, nj) > 0 && !visited[nindex] {
                    visited.set(nindex, true);
                    stack.push((ni, nj));
                }
            }
        }
    }
    clusters
}

/// Spatial set agreement `|A ∩ B| / |A ∪ B|` between two urban masks
pub fn lee_sallee(a: &PixelGrid, b: &PixelGrid) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (pa, pb) in a.iter().zip(b.iter()) {
        let ua = pa > 0;
        let ub = pb > 0;
        if ua && ub {
            intersection += 1;
        }
        if ua || ub {
            union += 1;
        }
    }
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Fraction of pixels holding the same class in both grids
pub fn class_match(simulated: &PixelGrid, observed: &PixelGrid) -> f64 {
    let total = simulated.total_pixels();
    if total == 0 {
        return 0.0;
    }
    simulated.intersection_count(observed) as f64 / total as f64
}

/// Measure all observables of an urban extent
///
/// `urbanizable` is the denominator for percent urban; `control` is the
/// observed mask for the same year, used for the Lee-Sallee term.
pub fn measure(
    z: &PixelGrid,
    slope: &PixelGrid,
    urbanizable: usize,
    control: &PixelGrid,
) -> Observables {
    let mut pop = 0usize;
    let mut edges = 0usize;
    let mut slope_sum = 0.0;
    let mut row_sum = 0.0;
    let mut col_sum = 0.0;

    for ((i, j), value) in z.indexed_iter() {
        if value == 0 {
            continue;
        }
        pop += 1;
        slope_sum += f64::from(slope.get(i, j));
        row_sum += i as f64;
        col_sum += j as f64;
        if z.count_neighbors(i, j, Comparator::Eq, 0) > 0 {
            edges += 1;
        }
    }

    if pop == 0 {
        return Observables::default();
    }

    let popf = pop as f64;
    let ymean = row_sum / popf;
    let xmean = col_sum / popf;

    let mut spread_sum = 0.0;
    for ((i, j), value) in z.indexed_iter() {
        if value > 0 {
            let dr = i as f64 - ymean;
            let dc = j as f64 - xmean;
            spread_sum += dr * dr + dc * dc;
        }
    }

    let clusters = count_clusters(z);
    let mean_cluster_size = if clusters == 0 {
        0.0
    } else {
        popf / clusters as f64
    };
    let percent_urban = if urbanizable == 0 {
        0.0
    } else {
        100.0 * popf / urbanizable as f64
    };

    Observables {
        pop: popf,
        edges: edges as f64,
        clusters: clusters as f64,
        mean_cluster_size,
        average_slope: slope_sum / popf,
        percent_urban,
        xmean,
        ymean,
        radial_spread: (spread_sum / popf).sqrt(),
        lee_sallee: lee_sallee(z, control),
    }
}
