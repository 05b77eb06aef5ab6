//! Spatial data structures and raster primitives
//!
//! This module contains the grid-level functionality:
//! - Pixel grids, comparators, and whole-grid operations
//! - Eight-neighbour walks and scans
//! - The working-grid arena
//! - The immutable input landscape

/// Working-grid pool with checked lease and release
pub mod arena;
/// Raster grid storage and pixel operations
pub mod grid;
/// Read-only input layers loaded at boot
pub mod landscape;
/// Eight-neighbour offsets and scans
pub mod neighbors;

pub use grid::{Comparator, Pixel, PixelGrid};
pub use landscape::Landscape;
