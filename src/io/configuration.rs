//! Engine constants and scenario defaults

use crate::spatial::grid::Pixel;

/// Lowest pixel value that counts as urban in the Z grid
pub const PHASE0G: Pixel = 3;
/// Pixel colour tagging diffusive (spontaneous) urbanization
pub const PHASE1G: Pixel = 4;
/// Pixel colour tagging spreading-centre urbanization
pub const PHASE2G: Pixel = 5;
/// Pixel colour tagging organic edge urbanization
pub const PHASE3G: Pixel = 6;
/// Pixel colour tagging road-influenced urbanization
pub const PHASE4G: Pixel = 7;
/// Pixel colour tagging road-influenced secondary urbanization
pub const PHASE5G: Pixel = 8;

/// Pixel value written into Z for seed urban pixels
pub const URBAN_SEED: Pixel = 100;

/// Normalized pixel value for road cells after input conditioning
pub const ROAD: Pixel = 100;

/// Excluded-layer pixels at or above this value may never urbanize
pub const EXCLUDED: Pixel = 100;

/// Upper clamp for all five growth coefficients
pub const MAX_COEFF: f64 = 100.0;
/// Lower clamp for all five growth coefficients
pub const MIN_COEFF: f64 = 1.0;

/// Number of working grids held by the arena per run
pub const WORKING_GRIDS: usize = 4;

// Self-modification defaults, overridable from the scenario file
/// Growth rate above which the boom branch fires
pub const DEFAULT_CRITICAL_HIGH: f64 = 1.3;
/// Growth rate below which the bust branch fires
pub const DEFAULT_CRITICAL_LOW: f64 = 0.97;
/// Boom multiplier applied to diffusion, spread, and breed
pub const DEFAULT_BOOM: f64 = 1.01;
/// Bust multiplier applied to diffusion, spread, and breed
pub const DEFAULT_BUST: f64 = 0.09;
/// Scale on the road gravity adjustment during boom and bust
pub const DEFAULT_ROAD_GRAV_SENSITIVITY: f64 = 0.01;
/// Scale on the slope resistance adjustment during boom and bust
pub const DEFAULT_SLOPE_SENSITIVITY: f64 = 0.1;
/// Slope percentage at which urbanization is always rejected
pub const DEFAULT_CRITICAL_SLOPE: f64 = 21.0;

/// Default Monte Carlo replication count
pub const DEFAULT_MONTE_CARLO_ITERATIONS: usize = 4;
/// Default random seed when the scenario does not set one
pub const DEFAULT_SEED: u64 = 42;

/// Base name of the restart file in the output directory
pub const RESTART_FILE: &str = "restart.data";
/// Base name of the control statistics file
pub const CONTROL_STATS_FILE: &str = "control_stats.log";
/// Base name of the coefficient log
pub const COEFF_FILE: &str = "coeff.log";
/// Base name of the averaged observables table
pub const AVG_FILE: &str = "avg.log";
/// Base name of the standard deviation table
pub const STD_DEV_FILE: &str = "std_dev.log";

/// Width of progress bars in characters
pub const PROGRESS_BAR_WIDTH: u16 = 40;
