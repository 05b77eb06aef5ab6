//! Working-grid arena with checked lease and release
//!
//! Scratch grids are pooled and handed out as leases. A lease moves the
//! grid out of its slot; releasing moves it back and bumps the slot
//! generation, so a stale or mismatched release is detected instead of
//! silently corrupting the pool. The driver verifies the pool is drained
//! at the end of every run.

use std::ops::{Deref, DerefMut};

use crate::io::error::{Result, resource_error};
use crate::spatial::grid::PixelGrid;

struct Slot {
    grid: Option<PixelGrid>,
    generation: u32,
}

/// Pool of same-shaped scratch grids
pub struct GridArena {
    slots: Vec<Slot>,
    shape: (usize, usize),
}

/// Exclusive handle to one pooled grid
///
/// Dereferences to [`PixelGrid`]. The grid is returned to the pool with
/// [`GridArena::release`]; leases hold dirty contents from their previous
/// use, so callers fill or seed before reading.
pub struct GridLease {
    grid: PixelGrid,
    slot: usize,
    generation: u32,
}

impl Deref for GridLease {
    type Target = PixelGrid;

    fn deref(&self) -> &Self::Target {
        &self.grid
    }
}

impl DerefMut for GridLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.grid
    }
}

impl GridArena {
    /// Create a pool of `count` zeroed grids of the model shape
    pub fn new(count: usize, nrows: usize, ncols: usize) -> Self {
        let slots = (0..count)
            .map(|_| Slot {
                grid: Some(PixelGrid::new(nrows, ncols)),
                generation: 0,
            })
            .collect();
        Self {
            slots,
            shape: (nrows, ncols),
        }
    }

    /// Shape of every grid in the pool
    pub const fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Check out a grid from the pool
    ///
    /// # Errors
    ///
    /// Returns a resource error when every slot is already leased, which
    /// means some code path holds more scratch grids than the pool was
    /// sized for.
    pub fn lease(&mut self) -> Result<GridLease> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(grid) = slot.grid.take() {
                return Ok(GridLease {
                    grid,
                    slot: index,
                    generation: slot.generation,
                });
            }
        }
        Err(resource_error(&format!(
            "all {} working grids are leased",
            self.slots.len()
        )))
    }

    /// Return a leased grid to its slot
    ///
    /// # Errors
    ///
    /// Returns a resource error when the lease does not belong to this
    /// arena's current generation or its slot is unexpectedly occupied.
    pub fn release(&mut self, lease: GridLease) -> Result<()> {
        let Some(slot) = self.slots.get_mut(lease.slot) else {
            return Err(resource_error(&format!(
                "released lease names slot {} of a {}-slot arena",
                lease.slot,
                self.slots.len()
            )));
        };
        if slot.generation != lease.generation {
            return Err(resource_error(&format!(
                "stale lease for slot {}: generation {} != {}",
                lease.slot, lease.generation, slot.generation
            )));
        }
        if slot.grid.is_some() {
            return Err(resource_error(&format!(
                "slot {} released twice",
                lease.slot
            )));
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.grid = Some(lease.grid);
        Ok(())
    }

    /// Number of leases currently outstanding
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|s| s.grid.is_none()).count()
    }

    /// Assert that every lease has been returned
    ///
    /// # Errors
    ///
    /// Returns a resource error naming the number of unreturned leases.
    pub fn verify_drained(&self) -> Result<()> {
        let open = self.outstanding();
        if open == 0 {
            Ok(())
        } else {
            Err(resource_error(&format!(
                "{open} working grid lease(s) never returned"
            )))
        }
    }
}
