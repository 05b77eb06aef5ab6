//! Line-oriented `KEY=VALUE` scenario file parser
//!
//! The scenario names every input raster, the coefficient sweep bounds,
//! the Monte Carlo setup, self-modification thresholds, output colours,
//! and the logging switches. Unknown keys are fatal so a typo never
//! silently drops a setting. Raster filenames resolve against
//! `INPUT_DIR`, so that key must precede the file entries.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::engine::coefficients::{CoeffInts, SelfModParams};
use crate::io::configuration::{
    DEFAULT_BOOM, DEFAULT_BUST, DEFAULT_CRITICAL_HIGH, DEFAULT_CRITICAL_LOW,
    DEFAULT_CRITICAL_SLOPE, DEFAULT_MONTE_CARLO_ITERATIONS, DEFAULT_ROAD_GRAV_SENSITIVITY,
    DEFAULT_SEED, DEFAULT_SLOPE_SENSITIVITY,
};
use crate::io::error::{Result, SimError};
use crate::spatial::grid::Pixel;

/// One probability-colour bucket for prediction imagery
#[derive(Debug, Clone, Copy)]
pub struct ProbabilityColor {
    /// Inclusive lower probability percent
    pub lower: Pixel,
    /// Inclusive upper probability percent
    pub upper: Pixel,
    /// RGB colour rendered for the bucket
    pub color: [u8; 3],
}

/// Parsed scenario configuration
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Path the scenario was read from
    pub path: PathBuf,
    /// Directory holding the input rasters
    pub input_dir: PathBuf,
    /// Directory receiving every output file
    pub output_dir: PathBuf,
    /// Urban control rasters as (year, path), in file order
    pub urban_files: Vec<(u32, PathBuf)>,
    /// Road rasters as (year, path), in file order
    pub road_files: Vec<(u32, PathBuf)>,
    /// Land-use rasters as (year, path), in file order
    pub landuse_files: Vec<(u32, PathBuf)>,
    /// Percent-slope raster
    pub slope_file: PathBuf,
    /// Exclusion raster
    pub excluded_file: PathBuf,
    /// Background raster for image composition
    pub background_file: PathBuf,
    /// Seed for the replication RNG
    pub random_seed: u64,
    /// Monte Carlo replications per coefficient combination
    pub monte_carlo_iterations: usize,
    /// Sweep start bounds
    pub start: CoeffInts,
    /// Sweep stop bounds
    pub stop: CoeffInts,
    /// Sweep step sizes
    pub step: CoeffInts,
    /// Best-fit coefficients used by prediction
    pub best_fit: CoeffInts,
    /// First year of prediction output
    pub prediction_start_date: u32,
    /// Final simulated year in prediction mode
    pub prediction_stop_date: u32,
    /// Growth rate above which boom feedback fires
    pub critical_high: f64,
    /// Growth rate below which bust feedback fires
    pub critical_low: f64,
    /// Boom multiplier
    pub boom: f64,
    /// Bust multiplier
    pub bust: f64,
    /// Road gravity adjustment scale
    pub road_grav_sensitivity: f64,
    /// Slope resistance adjustment scale
    pub slope_sensitivity: f64,
    /// Slope percent at which urbanization always fails
    pub critical_slope: f64,
    /// Probability colour buckets for prediction imagery
    pub probability_colors: Vec<ProbabilityColor>,
    /// Colour of seed pixels in output imagery
    pub seed_color: [u8; 3],
    /// Colour of the date annotation
    pub date_color: [u8; 3],
    /// Colour of water / fully excluded pixels
    pub water_color: [u8; 3],
    /// Echo parsed settings to standard output
    pub echo: bool,
    /// Emit one coefficient line per simulated year
    pub log_coeff: bool,
    /// Write the coefficient log file
    pub write_coeff_file: bool,
    /// Write the averaged observables table
    pub write_avg_file: bool,
    /// Write the standard deviation table
    pub write_std_dev_file: bool,
    /// Write a restart record after each finished combination
    pub write_restart_file: bool,
    /// Write per-year growth-type imagery in test mode
    pub view_growth_types: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            urban_files: Vec::new(),
            road_files: Vec::new(),
            landuse_files: Vec::new(),
            slope_file: PathBuf::new(),
            excluded_file: PathBuf::new(),
            background_file: PathBuf::new(),
            random_seed: DEFAULT_SEED,
            monte_carlo_iterations: DEFAULT_MONTE_CARLO_ITERATIONS,
            start: CoeffInts::splat(1),
            stop: CoeffInts::splat(1),
            step: CoeffInts::splat(1),
            best_fit: CoeffInts::splat(1),
            prediction_start_date: 0,
            prediction_stop_date: 0,
            critical_high: DEFAULT_CRITICAL_HIGH,
            critical_low: DEFAULT_CRITICAL_LOW,
            boom: DEFAULT_BOOM,
            bust: DEFAULT_BUST,
            road_grav_sensitivity: DEFAULT_ROAD_GRAV_SENSITIVITY,
            slope_sensitivity: DEFAULT_SLOPE_SENSITIVITY,
            critical_slope: DEFAULT_CRITICAL_SLOPE,
            probability_colors: Vec::new(),
            seed_color: [249, 209, 110],
            date_color: [255, 255, 255],
            water_color: [20, 52, 214],
            echo: false,
            log_coeff: false,
            write_coeff_file: false,
            write_avg_file: false,
            write_std_dev_file: false,
            write_restart_file: false,
            view_growth_types: false,
        }
    }
}

fn scenario_error(path: &Path, line: usize, reason: impl Into<String>) -> SimError {
    SimError::Scenario {
        path: path.to_path_buf(),
        line: Some(line),
        reason: reason.into(),
    }
}

fn parse_value<T: FromStr>(path: &Path, line: usize, key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| scenario_error(path, line, format!("cannot parse {key}={value}")))
}

fn parse_flag(path: &Path, line: usize, key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "1" => Ok(true),
        "NO" | "FALSE" | "0" => Ok(false),
        _ => Err(scenario_error(
            path,
            line,
            format!("{key} expects yes or no, got '{value}'"),
        )),
    }
}

fn parse_rgb(path: &Path, line: usize, key: &str, value: &str) -> Result<[u8; 3]> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(scenario_error(
            path,
            line,
            format!("{key} expects R,G,B, got '{value}'"),
        ));
    }
    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(&parts) {
        *slot = parse_value(path, line, key, part)?;
    }
    Ok(rgb)
}

fn parse_probability_color(path: &Path, line: usize, value: &str) -> Result<ProbabilityColor> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 5 {
        return Err(scenario_error(
            path,
            line,
            format!("PROBABILITY_COLOR expects lower,upper,R,G,B, got '{value}'"),
        ));
    }
    Ok(ProbabilityColor {
        lower: parse_value(path, line, "PROBABILITY_COLOR", parts[0])?,
        upper: parse_value(path, line, "PROBABILITY_COLOR", parts[1])?,
        color: [
            parse_value(path, line, "PROBABILITY_COLOR", parts[2])?,
            parse_value(path, line, "PROBABILITY_COLOR", parts[3])?,
            parse_value(path, line, "PROBABILITY_COLOR", parts[4])?,
        ],
    })
}

/// Pull the raster year out of a filename such as `demo.urban.1990.gif`
fn year_from_filename(path: &Path, line: usize, name: &str) -> Result<u32> {
    let bytes = name.as_bytes();
    let mut run_start = None;
    let mut run_len = 0;
    for (idx, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            if run_start.is_none() {
                run_start = Some(idx);
                run_len = 0;
            }
            run_len += 1;
            if run_len == 4 {
                let next_is_digit = bytes.get(idx + 1).is_some_and(u8::is_ascii_digit);
                if !next_is_digit {
                    if let Some(start) = run_start {
                        if let Ok(year) = name[start..=idx].parse() {
                            return Ok(year);
                        }
                    }
                }
            }
        } else {
            run_start = None;
            run_len = 0;
        }
    }
    Err(scenario_error(
        path,
        line,
        format!("no four-digit year in filename '{name}'"),
    ))
}

impl Scenario {
    /// Read and parse a scenario file
    ///
    /// # Errors
    ///
    /// Returns a scenario error for unreadable files, unknown keys,
    /// unparsable values, or missing mandatory settings.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::FileSystem {
            path: path.to_path_buf(),
            operation: "read scenario",
            source: e,
        })?;
        Self::parse_str(&content, path)
    }

    /// Parse scenario text, attributing errors to `path`
    ///
    /// # Errors
    ///
    /// Returns a scenario error for unknown keys, unparsable values, or
    /// missing mandatory settings.
    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        let mut scenario = Self {
            path: path.to_path_buf(),
            ..Self::default()
        };

        for (index, raw_line) in content.lines().enumerate() {
            let line = index + 1;
            let text = raw_line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let Some((key, value)) = text.split_once('=') else {
                return Err(scenario_error(
                    path,
                    line,
                    format!("expected KEY=VALUE, got '{text}'"),
                ));
            };
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim();
            scenario.apply(path, line, &key, value)?;
        }

        scenario.validate()?;
        Ok(scenario)
    }

    fn input_path(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, path: &Path, line: usize, key: &str, value: &str) -> Result<()> {
        match key {
            "INPUT_DIR" => self.input_dir = PathBuf::from(value),
            "OUTPUT_DIR" => self.output_dir = PathBuf::from(value),
            "URBAN_DATA" => {
                let year = year_from_filename(path, line, value)?;
                self.urban_files.push((year, self.input_path(value)));
            }
            "ROAD_DATA" => {
                let year = year_from_filename(path, line, value)?;
                self.road_files.push((year, self.input_path(value)));
            }
            "LANDUSE_DATA" => {
                let year = year_from_filename(path, line, value)?;
                self.landuse_files.push((year, self.input_path(value)));
            }
            "SLOPE_DATA" => self.slope_file = self.input_path(value),
            "EXCLUDED_DATA" => self.excluded_file = self.input_path(value),
            "BACKGROUND_DATA" => self.background_file = self.input_path(value),
            "RANDOM_SEED" => self.random_seed = parse_value(path, line, key, value)?,
            "MONTE_CARLO_ITERATIONS" => {
                self.monte_carlo_iterations = parse_value(path, line, key, value)?;
            }
            "DIFFUSION_START" => self.start.diffusion = parse_value(path, line, key, value)?,
            "DIFFUSION_STOP" => self.stop.diffusion = parse_value(path, line, key, value)?,
            "DIFFUSION_STEP" => self.step.diffusion = parse_value(path, line, key, value)?,
            "DIFFUSION_BEST_FIT" => self.best_fit.diffusion = parse_value(path, line, key, value)?,
            "BREED_START" => self.start.breed = parse_value(path, line, key, value)?,
            "BREED_STOP" => self.stop.breed = parse_value(path, line, key, value)?,
            "BREED_STEP" => self.step.breed = parse_value(path, line, key, value)?,
            "BREED_BEST_FIT" => self.best_fit.breed = parse_value(path, line, key, value)?,
            "SPREAD_START" => self.start.spread = parse_value(path, line, key, value)?,
            "SPREAD_STOP" => self.stop.spread = parse_value(path, line, key, value)?,
            "SPREAD_STEP" => self.step.spread = parse_value(path, line, key, value)?,
            "SPREAD_BEST_FIT" => self.best_fit.spread = parse_value(path, line, key, value)?,
            "SLOPE_RESISTANCE_START" => {
                self.start.slope_resistance = parse_value(path, line, key, value)?;
            }
            "SLOPE_RESISTANCE_STOP" => {
                self.stop.slope_resistance = parse_value(path, line, key, value)?;
            }
            "SLOPE_RESISTANCE_STEP" => {
                self.step.slope_resistance = parse_value(path, line, key, value)?;
            }
            "SLOPE_RESISTANCE_BEST_FIT" => {
                self.best_fit.slope_resistance = parse_value(path, line, key, value)?;
            }
            "ROAD_GRAVITY_START" => self.start.road_gravity = parse_value(path, line, key, value)?,
            "ROAD_GRAVITY_STOP" => self.stop.road_gravity = parse_value(path, line, key, value)?,
            "ROAD_GRAVITY_STEP" => self.step.road_gravity = parse_value(path, line, key, value)?,
            "ROAD_GRAVITY_BEST_FIT" => {
                self.best_fit.road_gravity = parse_value(path, line, key, value)?;
            }
            "PREDICTION_START_DATE" => {
                self.prediction_start_date = parse_value(path, line, key, value)?;
            }
            "PREDICTION_STOP_DATE" => {
                self.prediction_stop_date = parse_value(path, line, key, value)?;
            }
            "CRITICAL_HIGH" => self.critical_high = parse_value(path, line, key, value)?,
            "CRITICAL_LOW" => self.critical_low = parse_value(path, line, key, value)?,
            "BOOM" => self.boom = parse_value(path, line, key, value)?,
            "BUST" => self.bust = parse_value(path, line, key, value)?,
            "ROAD_GRAV_SENSITIVITY" => {
                self.road_grav_sensitivity = parse_value(path, line, key, value)?;
            }
            "SLOPE_SENSITIVITY" => self.slope_sensitivity = parse_value(path, line, key, value)?,
            "CRITICAL_SLOPE" => self.critical_slope = parse_value(path, line, key, value)?,
            "PROBABILITY_COLOR" => {
                let entry = parse_probability_color(path, line, value)?;
                self.probability_colors.push(entry);
            }
            "SEED_COLOR" => self.seed_color = parse_rgb(path, line, key, value)?,
            "DATE_COLOR" => self.date_color = parse_rgb(path, line, key, value)?,
            "WATER_COLOR" => self.water_color = parse_rgb(path, line, key, value)?,
            "ECHO" => self.echo = parse_flag(path, line, key, value)?,
            "LOG_COEFF" => self.log_coeff = parse_flag(path, line, key, value)?,
            "WRITE_COEFF_FILE" => self.write_coeff_file = parse_flag(path, line, key, value)?,
            "WRITE_AVG_FILE" => self.write_avg_file = parse_flag(path, line, key, value)?,
            "WRITE_STD_DEV_FILE" => {
                self.write_std_dev_file = parse_flag(path, line, key, value)?;
            }
            "WRITE_RESTART_FILE" => {
                self.write_restart_file = parse_flag(path, line, key, value)?;
            }
            "VIEW_GROWTH_TYPES" => self.view_growth_types = parse_flag(path, line, key, value)?,
            _ => {
                return Err(scenario_error(path, line, format!("unknown key '{key}'")));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: String| SimError::Scenario {
            path: self.path.clone(),
            line: None,
            reason,
        };

        if self.urban_files.is_empty() {
            return Err(fail("no URBAN_DATA entries".to_string()));
        }
        if self.road_files.is_empty() {
            return Err(fail("no ROAD_DATA entries".to_string()));
        }
        if self.slope_file.as_os_str().is_empty() {
            return Err(fail("SLOPE_DATA is required".to_string()));
        }
        if self.excluded_file.as_os_str().is_empty() {
            return Err(fail("EXCLUDED_DATA is required".to_string()));
        }
        if self.background_file.as_os_str().is_empty() {
            return Err(fail("BACKGROUND_DATA is required".to_string()));
        }
        if self.monte_carlo_iterations == 0 {
            return Err(fail("MONTE_CARLO_ITERATIONS must be at least 1".to_string()));
        }
        if self.landuse_files.len() > 2 {
            return Err(fail(format!(
                "at most two LANDUSE_DATA entries supported, got {}",
                self.landuse_files.len()
            )));
        }
        Ok(())
    }

    /// Bundle the self-modification settings
    pub const fn self_mod_params(&self) -> SelfModParams {
        SelfModParams {
            critical_high: self.critical_high,
            critical_low: self.critical_low,
            boom: self.boom,
            bust: self.bust,
            road_grav_sensitivity: self.road_grav_sensitivity,
            slope_sensitivity: self.slope_sensitivity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
# demo scenario
INPUT_DIR=data/in
OUTPUT_DIR=data/out
URBAN_DATA=demo.urban.1990.gif
URBAN_DATA=demo.urban.1998.gif
ROAD_DATA=demo.roads.1990.gif
SLOPE_DATA=demo.slope.gif
EXCLUDED_DATA=demo.excluded.gif
BACKGROUND_DATA=demo.hillshade.gif
RANDOM_SEED=7
MONTE_CARLO_ITERATIONS=2
DIFFUSION_START=10
DIFFUSION_STOP=20
DIFFUSION_STEP=10
";

    #[test]
    fn minimal_scenario_parses() {
        let s = Scenario::parse_str(MINIMAL, Path::new("demo.scenario")).unwrap();
        assert_eq!(s.urban_files.len(), 2);
        assert_eq!(s.urban_files[0].0, 1990);
        assert_eq!(s.urban_files[1].0, 1998);
        assert_eq!(
            s.urban_files[0].1,
            PathBuf::from("data/in/demo.urban.1990.gif")
        );
        assert_eq!(s.random_seed, 7);
        assert_eq!(s.monte_carlo_iterations, 2);
        assert_eq!(s.start.diffusion, 10);
        assert_eq!(s.stop.diffusion, 20);
        assert_eq!(s.step.diffusion, 10);
        // Untouched coefficients keep their defaults.
        assert_eq!(s.start.breed, 1);
    }

    #[test]
    fn unknown_key_is_fatal() {
        let bad = format!("{MINIMAL}\nDIFFUSSION_START=5\n");
        let err = Scenario::parse_str(&bad, Path::new("demo.scenario")).unwrap_err();
        assert!(err.to_string().contains("unknown key"));
    }

    #[test]
    fn missing_urban_data_is_fatal() {
        let err = Scenario::parse_str("ROAD_DATA=r.1990.gif\n", Path::new("x")).unwrap_err();
        assert!(err.to_string().contains("URBAN_DATA"));
    }

    #[test]
    fn year_extraction_from_filenames() {
        let path = Path::new("x");
        assert_eq!(year_from_filename(path, 1, "demo.urban.1990.gif").unwrap(), 1990);
        assert_eq!(year_from_filename(path, 1, "roads2004.png").unwrap(), 2004);
        assert!(year_from_filename(path, 1, "slope.gif").is_err());
        // Five digits in a row never form a year.
        assert!(year_from_filename(path, 1, "grid12345.gif").is_err());
    }

    #[test]
    fn flags_and_colors_parse() {
        let text = format!(
            "{MINIMAL}\
WRITE_COEFF_FILE=yes
LOG_COEFF=NO
SEED_COLOR=10,20,30
PROBABILITY_COLOR=1,50,0,255,0
PROBABILITY_COLOR=51,100,255,0,0
"
        );
        let s = Scenario::parse_str(&text, Path::new("demo.scenario")).unwrap();
        assert!(s.write_coeff_file);
        assert!(!s.log_coeff);
        assert_eq!(s.seed_color, [10, 20, 30]);
        assert_eq!(s.probability_colors.len(), 2);
        assert_eq!(s.probability_colors[1].lower, 51);
        assert_eq!(s.probability_colors[1].color, [255, 0, 0]);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let bad = "INPUT_DIR=in\nnot a setting\n";
        let err = Scenario::parse_str(bad, Path::new("x")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
