//! The growth engine: coefficients, rules, drivers, and calibration

/// Monte Carlo sweep, scoring, and prediction drivers
pub mod calibration;
/// Coefficient roles and self-modification
pub mod coefficients;
/// Annual replication driver
pub mod driver;
/// The five stochastic growth rules
pub mod growth;
/// Run and year bookkeeping
pub mod processor;
