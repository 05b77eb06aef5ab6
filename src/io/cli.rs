//! Command-line interface and run orchestration

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::engine::calibration::{
    CalibrationReports, CoeffSweep, run_calibration, run_prediction, run_test,
};
use crate::engine::processor::Mode;
use crate::io::configuration::{
    AVG_FILE, COEFF_FILE, CONTROL_STATS_FILE, RESTART_FILE, STD_DEV_FILE,
};
use crate::io::error::Result;
use crate::io::progress::SweepProgress;
use crate::io::reports::{CoefficientLog, ControlStatsWriter, ObservableTable};
use crate::io::restart::read_restart;
use crate::io::scenario::Scenario;
use crate::spatial::landscape::Landscape;

/// Processing mode argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Sweep coefficient space against the control years
    Calibrate,
    /// Project future extent from the best-fit coefficients
    Predict,
    /// Single-combination shakedown with image output
    Test,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Calibrate => Self::Calibrate,
            ModeArg::Predict => Self::Predict,
            ModeArg::Test => Self::Test,
        }
    }
}

/// Command-line arguments for the growth model
#[derive(Parser)]
#[command(name = "sprawl")]
#[command(
    author,
    version,
    about = "Urban growth cellular automaton with Monte Carlo calibration"
)]
pub struct Cli {
    /// Processing mode
    #[arg(value_enum)]
    pub mode: ModeArg,

    /// Scenario file driving the run
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Loads the scenario and landscape, then dispatches on mode
pub struct ScenarioRunner {
    cli: Cli,
}

impl ScenarioRunner {
    /// Create a runner from parsed arguments
    pub const fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Execute the requested processing mode
    ///
    /// # Errors
    ///
    /// Returns the first configuration, input, simulation, or output error
    /// encountered; every such error is fatal.
    // Progress and summary lines are user feedback on stderr
    #[allow(clippy::print_stderr)]
    pub fn run(&self) -> Result<()> {
        let scenario = Scenario::from_file(&self.cli.scenario)?;
        if scenario.echo {
            eprintln!(
                "scenario {}: {} urban years, {} road years, {} monte carlo, seed {}",
                scenario.path.display(),
                scenario.urban_files.len(),
                scenario.road_files.len(),
                scenario.monte_carlo_iterations,
                scenario.random_seed
            );
        }

        let landscape = Landscape::load(&scenario)?;
        if scenario.echo {
            eprintln!(
                "landscape {}x{}, {} urbanizable pixels",
                landscape.nrows(),
                landscape.ncols(),
                landscape.urbanizable_pixels()
            );
        }

        match Mode::from(self.cli.mode) {
            Mode::Calibrate => self.calibrate(&landscape, &scenario),
            Mode::Predict => self.predict(&landscape, &scenario),
            Mode::Test => run_test(&landscape, &scenario),
        }
    }

    #[allow(clippy::print_stderr)]
    fn calibrate(&self, landscape: &Landscape, scenario: &Scenario) -> Result<()> {
        let out = &scenario.output_dir;
        let restart_path = out.join(RESTART_FILE);

        // A restart record from the same seed resumes the sweep.
        let skip = if scenario.write_restart_file {
            match read_restart(&restart_path)? {
                Some(record) if record.random_seed == scenario.random_seed => {
                    if !self.cli.quiet {
                        eprintln!("resuming after {} finished combinations", record.counter);
                    }
                    record.counter
                }
                _ => 0,
            }
        } else {
            0
        };

        let mut reports = CalibrationReports {
            control_stats: ControlStatsWriter::create(&out.join(CONTROL_STATS_FILE))?,
            coeff_log: scenario
                .write_coeff_file
                .then(|| CoefficientLog::create(&out.join(COEFF_FILE)))
                .transpose()?,
            avg: scenario
                .write_avg_file
                .then(|| ObservableTable::create(&out.join(AVG_FILE)))
                .transpose()?,
            std_dev: scenario
                .write_std_dev_file
                .then(|| ObservableTable::create(&out.join(STD_DEV_FILE)))
                .transpose()?,
            restart_path: scenario.write_restart_file.then(|| restart_path.clone()),
        };

        let total = CoeffSweep::new(scenario.start, scenario.stop, scenario.step)
            .combination_count() as u64;
        let progress =
            (!self.cli.quiet).then(|| SweepProgress::new(total, "calibrating"));

        let best = run_calibration(landscape, scenario, &mut reports, progress.as_ref(), skip)?;

        if let Some(bar) = &progress {
            bar.finish();
        }
        if !self.cli.quiet {
            let c = best.combo;
            eprintln!(
                "best fit {:.5}: diffusion={} breed={} spread={} slope_resistance={} road_gravity={}",
                best.product,
                c.diffusion,
                c.breed,
                c.spread,
                c.slope_resistance,
                c.road_gravity
            );
        }
        Ok(())
    }

    fn predict(&self, landscape: &Landscape, scenario: &Scenario) -> Result<()> {
        let progress = (!self.cli.quiet).then(|| {
            SweepProgress::new(scenario.monte_carlo_iterations as u64, "predicting")
        });
        run_prediction(landscape, scenario, progress.as_ref())?;
        if let Some(bar) = &progress {
            bar.finish();
        }
        Ok(())
    }
}
