//! Growth coefficient state: sweep bounds, live values, and self-modification
//!
//! The five coefficients exist in six roles. Start, stop, step, and best-fit
//! are integer sweep bounds; current and saved are real-valued because
//! self-modification drifts them continuously during a replication.

use std::fmt;

use crate::io::configuration::{MAX_COEFF, MIN_COEFF};
use crate::io::error::{Result, invalid_parameter};

/// Real-valued coefficient tuple for the current and saved roles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Intensity of global random seeding
    pub diffusion: f64,
    /// Probability a new detached settlement survives and spawns
    pub breed: f64,
    /// Probability an edge pixel propagates to a neighbour
    pub spread: f64,
    /// Strength of slope-based suppression
    pub slope_resistance: f64,
    /// Reach of road-influenced growth in pixel radius
    pub road_gravity: f64,
}

/// Integer coefficient tuple for the start, stop, step, and best-fit roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoeffInts {
    /// Intensity of global random seeding
    pub diffusion: u32,
    /// Probability a new detached settlement survives and spawns
    pub breed: u32,
    /// Probability an edge pixel propagates to a neighbour
    pub spread: u32,
    /// Strength of slope-based suppression
    pub slope_resistance: u32,
    /// Reach of road-influenced growth in pixel radius
    pub road_gravity: u32,
}

impl CoeffInts {
    /// Tuple with every coefficient set to the same value
    pub const fn splat(value: u32) -> Self {
        Self {
            diffusion: value,
            breed: value,
            spread: value,
            slope_resistance: value,
            road_gravity: value,
        }
    }
}

impl Coefficients {
    /// Promote an integer tuple into the real-valued domain
    pub fn from_ints(ints: CoeffInts) -> Self {
        Self {
            diffusion: f64::from(ints.diffusion),
            breed: f64::from(ints.breed),
            spread: f64::from(ints.spread),
            slope_resistance: f64::from(ints.slope_resistance),
            road_gravity: f64::from(ints.road_gravity),
        }
    }

    fn clamp_all(&mut self) {
        self.diffusion = self.diffusion.clamp(MIN_COEFF, MAX_COEFF);
        self.breed = self.breed.clamp(MIN_COEFF, MAX_COEFF);
        self.spread = self.spread.clamp(MIN_COEFF, MAX_COEFF);
        self.slope_resistance = self.slope_resistance.clamp(MIN_COEFF, MAX_COEFF);
        self.road_gravity = self.road_gravity.clamp(MIN_COEFF, MAX_COEFF);
    }
}

impl fmt::Display for Coefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "diffusion={:.4} breed={:.4} spread={:.4} slope_resistance={:.4} road_gravity={:.4}",
            self.diffusion, self.breed, self.spread, self.slope_resistance, self.road_gravity
        )
    }
}

/// Feedback parameters for coefficient self-modification
#[derive(Debug, Clone, Copy)]
pub struct SelfModParams {
    /// Growth rate above which the boom branch fires
    pub critical_high: f64,
    /// Growth rate below which the bust branch fires
    pub critical_low: f64,
    /// Multiplier applied to diffusion, spread, and breed during boom
    pub boom: f64,
    /// Multiplier applied to diffusion, spread, and breed during bust
    pub bust: f64,
    /// Scale on the road gravity adjustment
    pub road_grav_sensitivity: f64,
    /// Scale on the slope resistance adjustment
    pub slope_sensitivity: f64,
}

/// Validate one coefficient's sweep bounds
///
/// # Errors
///
/// Returns an invalid-parameter error unless `1 <= start <= stop <= 100`
/// and `step >= 1`.
pub fn validate_sweep(name: &'static str, start: u32, stop: u32, step: u32) -> Result<()> {
    if start < 1 || start > stop || stop > 100 {
        return Err(invalid_parameter(
            name,
            &format!("{start}..{stop}"),
            &"bounds must satisfy 1 <= start <= stop <= 100",
        ));
    }
    if step < 1 {
        return Err(invalid_parameter(name, &step, &"step must be at least 1"));
    }
    Ok(())
}

/// All six roles of the five growth coefficients
#[derive(Debug, Clone)]
pub struct CoefficientSet {
    start: CoeffInts,
    stop: CoeffInts,
    step: CoeffInts,
    best_fit: CoeffInts,
    current: Coefficients,
    saved: Coefficients,
}

impl CoefficientSet {
    /// Build a set from sweep bounds and a best-fit tuple
    ///
    /// Current and saved are initialized from the start values.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error when any coefficient's bounds
    /// violate the sweep contract.
    pub fn new(
        start: CoeffInts,
        stop: CoeffInts,
        step: CoeffInts,
        best_fit: CoeffInts,
    ) -> Result<Self> {
        validate_sweep("diffusion", start.diffusion, stop.diffusion, step.diffusion)?;
        validate_sweep("breed", start.breed, stop.breed, step.breed)?;
        validate_sweep("spread", start.spread, stop.spread, step.spread)?;
        validate_sweep(
            "slope_resistance",
            start.slope_resistance,
            stop.slope_resistance,
            step.slope_resistance,
        )?;
        validate_sweep(
            "road_gravity",
            start.road_gravity,
            stop.road_gravity,
            step.road_gravity,
        )?;

        let current = Coefficients::from_ints(start);
        Ok(Self {
            start,
            stop,
            step,
            best_fit,
            current,
            saved: current,
        })
    }

    /// Sweep start tuple
    pub const fn start(&self) -> CoeffInts {
        self.start
    }

    /// Sweep stop tuple
    pub const fn stop(&self) -> CoeffInts {
        self.stop
    }

    /// Sweep step tuple
    pub const fn step(&self) -> CoeffInts {
        self.step
    }

    /// Best-fit tuple recorded after calibration
    pub const fn best_fit(&self) -> CoeffInts {
        self.best_fit
    }

    /// Live coefficient values
    pub const fn current(&self) -> Coefficients {
        self.current
    }

    /// Snapshot taken at the start of the running replication
    pub const fn saved(&self) -> Coefficients {
        self.saved
    }

    /// Record a best-fit tuple
    pub const fn set_best_fit(&mut self, best_fit: CoeffInts) {
        self.best_fit = best_fit;
    }

    /// Load the current role from an integer combination
    pub fn set_current(&mut self, combo: CoeffInts) {
        self.current = Coefficients::from_ints(combo);
    }

    /// Snapshot current into saved at replication start
    pub const fn snapshot(&mut self) {
        self.saved = self.current;
    }

    /// Restore current from saved so drift never leaks across replications
    pub const fn restore(&mut self) {
        self.current = self.saved;
    }

    /// Mutate the current coefficients from the observed growth pace
    ///
    /// A boom year multiplies diffusion, spread, and breed by the boom
    /// factor, eases slope resistance, and extends road gravity; a bust
    /// year does the reverse. Every coefficient is silently clamped to
    /// `[1.0, 100.0]` afterwards.
    pub fn self_modify(&mut self, growth_rate: f64, percent_urban: f64, params: &SelfModParams) {
        let c = &mut self.current;

        if growth_rate > params.critical_high {
            c.diffusion *= params.boom;
            c.spread *= params.boom;
            c.breed *= params.boom;
            if c.slope_resistance > MIN_COEFF {
                c.slope_resistance -= percent_urban * params.slope_sensitivity;
            }
            c.road_gravity += percent_urban * params.road_grav_sensitivity;
        } else if growth_rate < params.critical_low {
            c.diffusion *= params.bust;
            c.spread *= params.bust;
            c.breed *= params.bust;
            c.slope_resistance += percent_urban * params.slope_sensitivity;
            if c.road_gravity > MIN_COEFF {
                c.road_gravity -= percent_urban * params.road_grav_sensitivity;
            }
        }

        c.clamp_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(road_sens: f64, slope_sens: f64) -> SelfModParams {
        SelfModParams {
            critical_high: 10.0,
            critical_low: 0.5,
            boom: 1.1,
            bust: 0.9,
            road_grav_sensitivity: road_sens,
            slope_sensitivity: slope_sens,
        }
    }

    fn tens() -> CoefficientSet {
        CoefficientSet::new(
            CoeffInts::splat(10),
            CoeffInts::splat(10),
            CoeffInts::splat(1),
            CoeffInts::splat(10),
        )
        .unwrap()
    }

    #[test]
    fn boom_multiplies_and_shifts() {
        let mut set = tens();
        set.self_modify(50.0, 5.0, &params(1.0, 1.0));
        let c = set.current();
        assert!((c.diffusion - 11.0).abs() < 1e-12);
        assert!((c.breed - 11.0).abs() < 1e-12);
        assert!((c.spread - 11.0).abs() < 1e-12);
        assert!((c.slope_resistance - 5.0).abs() < 1e-12);
        assert!((c.road_gravity - 15.0).abs() < 1e-12);
    }

    #[test]
    fn bust_divides_and_shifts_back() {
        let mut set = tens();
        set.self_modify(0.1, 5.0, &params(1.0, 1.0));
        let c = set.current();
        assert!((c.diffusion - 9.0).abs() < 1e-12);
        assert!((c.slope_resistance - 15.0).abs() < 1e-12);
        assert!((c.road_gravity - 5.0).abs() < 1e-12);
    }

    #[test]
    fn quiet_year_changes_nothing() {
        let mut set = tens();
        let before = set.current();
        set.self_modify(5.0, 50.0, &params(1.0, 1.0));
        assert_eq!(set.current(), before);
    }

    #[test]
    fn clamp_holds_after_extreme_feedback() {
        let mut set = CoefficientSet::new(
            CoeffInts::splat(95),
            CoeffInts::splat(100),
            CoeffInts::splat(1),
            CoeffInts::splat(95),
        )
        .unwrap();
        for _ in 0..50 {
            set.self_modify(1e6, 100.0, &params(10.0, 10.0));
        }
        let c = set.current();
        for value in [
            c.diffusion,
            c.breed,
            c.spread,
            c.slope_resistance,
            c.road_gravity,
        ] {
            assert!((MIN_COEFF..=MAX_COEFF).contains(&value));
        }
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let mut set = tens();
        set.snapshot();
        set.self_modify(50.0, 5.0, &params(1.0, 1.0));
        assert!((set.current().diffusion - 11.0).abs() < 1e-12);
        set.restore();
        assert!((set.current().diffusion - 10.0).abs() < 1e-12);
    }

    #[test]
    fn sweep_bounds_are_validated() {
        assert!(validate_sweep("diffusion", 1, 100, 1).is_ok());
        assert!(validate_sweep("diffusion", 0, 100, 1).is_err());
        assert!(validate_sweep("diffusion", 50, 40, 1).is_err());
        assert!(validate_sweep("diffusion", 1, 101, 1).is_err());
        assert!(validate_sweep("diffusion", 1, 100, 0).is_err());
    }
}
