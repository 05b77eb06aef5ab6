//! Mid-sweep restart records
//!
//! A restart file holds seven whitespace-separated integers: the five
//! coefficients of the last finished combination, the random seed, and a
//! counter of completed combinations. Reading it at boot lets a killed
//! calibration resume where it stopped.

use std::path::Path;

use crate::engine::coefficients::CoeffInts;
use crate::io::error::{Result, SimError};

/// Everything needed to resume a calibration sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRecord {
    /// Coefficients of the last finished combination
    pub coeffs: CoeffInts,
    /// Random seed the sweep was started with
    pub random_seed: u64,
    /// Number of combinations already finished
    pub counter: usize,
}

/// Write a restart record
///
/// # Errors
///
/// Returns a file system error when the record cannot be written.
pub fn write_restart(path: &Path, record: &RestartRecord) -> Result<()> {
    let c = record.coeffs;
    let text = format!(
        "{} {} {} {} {} {} {}",
        c.diffusion,
        c.breed,
        c.spread,
        c.slope_resistance,
        c.road_gravity,
        record.random_seed,
        record.counter
    );
    std::fs::write(path, text).map_err(|e| SimError::FileSystem {
        path: path.to_path_buf(),
        operation: "write restart",
        source: e,
    })
}

/// Read a restart record if the file exists
///
/// # Errors
///
/// Returns a restart error when the file exists but does not hold exactly
/// seven parsable integers, or a file system error when it cannot be read.
pub fn read_restart(path: &Path) -> Result<Option<RestartRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| SimError::FileSystem {
        path: path.to_path_buf(),
        operation: "read restart",
        source: e,
    })?;

    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 7 {
        return Err(SimError::Restart {
            path: path.to_path_buf(),
            reason: format!("expected 7 integers, found {}", fields.len()),
        });
    }

    let parse = |index: usize| -> Result<u64> {
        fields
            .get(index)
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| SimError::Restart {
                path: path.to_path_buf(),
                reason: format!("field {} is not an integer", index + 1),
            })
    };

    Ok(Some(RestartRecord {
        coeffs: CoeffInts {
            diffusion: parse(0)? as u32,
            breed: parse(1)? as u32,
            spread: parse(2)? as u32,
            slope_resistance: parse(3)? as u32,
            road_gravity: parse(4)? as u32,
        },
        random_seed: parse(5)?,
        counter: parse(6)? as usize,
    }))
}
