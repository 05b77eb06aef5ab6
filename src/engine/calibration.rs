//! Coefficient sweep, Monte Carlo averaging, and fit scoring
//!
//! Calibration walks the Cartesian product of the five coefficient ranges.
//! Every combination runs M replications; observables recorded at the
//! control years are averaged, regressed against the observed imagery, and
//! folded into a thirteen-field score row. Prediction reuses the same
//! replication machinery with the best-fit tuple and accumulates per-pixel
//! urbanization counts into probability imagery.

use std::path::PathBuf;

use crate::analysis::accumulate::Accumulator;
use crate::analysis::observables::{Observables, class_match, measure};
use crate::engine::coefficients::{CoeffInts, CoefficientSet};
use crate::engine::driver::{ReplicationConfig, run_replication};
use crate::engine::processor::{Mode, Processor};
use crate::io::configuration::{
    EXCLUDED, PHASE1G, PHASE2G, PHASE3G, PHASE4G, PHASE5G, URBAN_SEED, WORKING_GRIDS,
};
use crate::io::error::{Result, invalid_parameter};
use crate::io::progress::SweepProgress;
use crate::io::raster::{ColorTable, stamp_date, write_grid_gif};
use crate::io::reports::{CoefficientLog, ControlStatsWriter, ObservableTable, Scores};
use crate::io::restart::{RestartRecord, write_restart};
use crate::io::scenario::{ProbabilityColor, Scenario};
use crate::math::regression::r_squared;
use crate::spatial::arena::GridArena;
use crate::spatial::grid::{Comparator, PixelGrid, RemapInterval, RemapTable, ValueGrid};
use crate::spatial::landscape::Landscape;

// Colour-index layout for composed output imagery. Background pixels are
// squashed below the reserved band so they never collide with overlays.
const BACKGROUND_CEILING: u8 = 196;
const WATER_INDEX: u8 = 196;
const SEED_INDEX: u8 = 198;
const DATE_INDEX: u8 = 199;
const PROB_INDEX_BASE: u8 = 200;

/// Odometer over the Cartesian product of the five coefficient ranges
///
/// Road gravity varies fastest, diffusion slowest.
#[derive(Debug, Clone)]
pub struct CoeffSweep {
    start: CoeffInts,
    stop: CoeffInts,
    step: CoeffInts,
    next: Option<CoeffInts>,
}

fn range_len(start: u32, stop: u32, step: u32) -> usize {
    if start > stop || step == 0 {
        0
    } else {
        ((stop - start) / step + 1) as usize
    }
}

impl CoeffSweep {
    /// Create a sweep over `start..=stop` by `step` per coefficient
    pub const fn new(start: CoeffInts, stop: CoeffInts, step: CoeffInts) -> Self {
        Self {
            start,
            stop,
            step,
            next: Some(start),
        }
    }

    /// Number of combinations the sweep will yield
    pub fn combination_count(&self) -> usize {
        range_len(self.start.diffusion, self.stop.diffusion, self.step.diffusion)
            * range_len(self.start.breed, self.stop.breed, self.step.breed)
            * range_len(self.start.spread, self.stop.spread, self.step.spread)
            * range_len(
                self.start.slope_resistance,
                self.stop.slope_resistance,
                self.step.slope_resistance,
            )
            * range_len(
                self.start.road_gravity,
                self.stop.road_gravity,
                self.step.road_gravity,
            )
    }
}

impl Iterator for CoeffSweep {
    type Item = CoeffInts;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let mut following = current;

        following.road_gravity += self.step.road_gravity;
        if following.road_gravity > self.stop.road_gravity {
            following.road_gravity = self.start.road_gravity;
            following.slope_resistance += self.step.slope_resistance;
            if following.slope_resistance > self.stop.slope_resistance {
                following.slope_resistance = self.start.slope_resistance;
                following.spread += self.step.spread;
                if following.spread > self.stop.spread {
                    following.spread = self.start.spread;
                    following.breed += self.step.breed;
                    if following.breed > self.stop.breed {
                        following.breed = self.start.breed;
                        following.diffusion += self.step.diffusion;
                        if following.diffusion > self.stop.diffusion {
                            self.next = None;
                            return Some(current);
                        }
                    }
                }
            }
        }

        self.next = Some(following);
        Some(current)
    }
}

/// Report sinks for one calibration run
pub struct CalibrationReports {
    /// Scored row per combination
    pub control_stats: ControlStatsWriter,
    /// Optional per-year coefficient tuples
    pub coeff_log: Option<CoefficientLog>,
    /// Optional Monte Carlo averages per control year
    pub avg: Option<ObservableTable>,
    /// Optional Monte Carlo standard deviations per control year
    pub std_dev: Option<ObservableTable>,
    /// When set, a restart record is written after each combination
    pub restart_path: Option<PathBuf>,
}

/// Best combination found by a sweep
#[derive(Debug, Clone, Copy)]
pub struct BestFit {
    /// The winning coefficient tuple
    pub combo: CoeffInts,
    /// Its overall fit product
    pub product: f64,
}

fn replication_config(scenario: &Scenario) -> ReplicationConfig {
    ReplicationConfig {
        critical_slope: scenario.critical_slope,
        self_mod: scenario.self_mod_params(),
    }
}

/// Land-use agreement factor for the score row
///
/// Land-cover transition modelling is out of scope; with two observed
/// layers the persistence agreement between them is reported, otherwise
/// the factor is neutral.
fn landuse_match(landscape: &Landscape) -> f64 {
    let layers = landscape.landuse_layers();
    match (layers.first(), layers.get(1)) {
        (Some(a), Some(b)) => class_match(&b.grid, &a.grid),
        _ => 1.0,
    }
}

fn population_compare(simulated: f64, observed: f64) -> f64 {
    let larger = simulated.max(observed);
    if larger <= 0.0 {
        return 1.0;
    }
    simulated.min(observed) / larger
}

fn field_r_squared(
    simulated: &[Observables],
    observed: &[Observables],
    field: impl Fn(&Observables) -> f64,
) -> f64 {
    let x: Vec<f64> = simulated.iter().map(&field).collect();
    let y: Vec<f64> = observed.iter().map(&field).collect();
    r_squared(&x, &y)
}

fn score_combination(simulated: &[Observables], observed: &[Observables], fmatch: f64) -> Scores {
    let final_sim = simulated.last().copied().unwrap_or_default();
    let final_obs = observed.last().copied().unwrap_or_default();
    let lee_sallee = if simulated.is_empty() {
        0.0
    } else {
        simulated.iter().map(|o| o.lee_sallee).sum::<f64>() / simulated.len() as f64
    };

    Scores {
        product: 0.0,
        compare: population_compare(final_sim.pop, final_obs.pop),
        pop: field_r_squared(simulated, observed, |o| o.pop),
        edges: field_r_squared(simulated, observed, |o| o.edges),
        clusters: field_r_squared(simulated, observed, |o| o.clusters),
        cluster_size: field_r_squared(simulated, observed, |o| o.mean_cluster_size),
        lee_sallee,
        slope: field_r_squared(simulated, observed, |o| o.average_slope),
        percent_urban: field_r_squared(simulated, observed, |o| o.percent_urban),
        xmean: field_r_squared(simulated, observed, |o| o.xmean),
        ymean: field_r_squared(simulated, observed, |o| o.ymean),
        rad: field_r_squared(simulated, observed, |o| o.radial_spread),
        fmatch,
    }
    .with_product()
}

/// Sweep coefficient space and score every combination
///
/// `skip` combinations are fast-forwarded at the front of the sweep, which
/// is how a restart record resumes a killed run. Returns the best fit; the
/// caller decides whether to persist it.
///
/// # Errors
///
/// Returns an error when the scenario has fewer than two urban control
/// years, a replication fails, or a report cannot be written.
pub fn run_calibration(
    landscape: &Landscape,
    scenario: &Scenario,
    reports: &mut CalibrationReports,
    progress: Option<&SweepProgress>,
    skip: usize,
) -> Result<BestFit> {
    let years = landscape.urban_years();
    if years.len() < 2 {
        return Err(invalid_parameter(
            "urban_files",
            &years.len(),
            &"calibration needs at least two urban control years",
        ));
    }
    let start_year = years[0];
    let stop_year = years[years.len() - 1];
    let scoring_years: Vec<u32> = years[1..].to_vec();

    // Observed targets are fixed across the whole sweep.
    let observed: Vec<Observables> = scoring_years
        .iter()
        .filter_map(|&year| landscape.urban_by_year(year))
        .map(|grid| measure(grid, landscape.slope(), landscape.urbanizable_pixels(), grid))
        .collect();
    let fmatch = landuse_match(landscape);

    let sweep = CoeffSweep::new(scenario.start, scenario.stop, scenario.step);
    let total_runs = sweep.combination_count();
    let mc = scenario.monte_carlo_iterations;

    let mut proc = Processor::new(Mode::Calibrate, total_runs, mc);
    let mut arena = GridArena::new(WORKING_GRIDS, landscape.nrows(), landscape.ncols());
    let mut coeffs = CoefficientSet::new(scenario.start, scenario.stop, scenario.step, scenario.best_fit)?;
    let config = replication_config(scenario);

    let mut best = BestFit {
        combo: scenario.start,
        product: f64::NEG_INFINITY,
    };

    for combo in sweep {
        let run = proc.current_run();
        proc.advance_run();
        if run < skip {
            if let Some(bar) = progress {
                bar.inc();
            }
            continue;
        }

        coeffs.set_current(combo);
        let mut accumulators = vec![Accumulator::new(); scoring_years.len()];

        for m in 0..mc {
            proc.set_monte_carlo(m);
            let seed = scenario.random_seed ^ m as u64;
            let coeff_log = &mut reports.coeff_log;
            let accs = &mut accumulators;
            let scoring = &scoring_years;
            run_replication(
                landscape,
                &mut arena,
                &mut coeffs,
                &config,
                &mut proc,
                &landscape.earliest_urban().grid,
                start_year,
                stop_year,
                seed,
                |z, outcome| {
                    if let Some(k) = scoring.iter().position(|&y| y == outcome.year) {
                        if let Some(control) = landscape.urban_by_year(outcome.year) {
                            let obs = measure(
                                z,
                                landscape.slope(),
                                landscape.urbanizable_pixels(),
                                control,
                            );
                            if let Some(acc) = accs.get_mut(k) {
                                acc.record(&obs);
                            }
                        }
                    }
                    if let Some(log) = coeff_log.as_mut() {
                        log.append(run, m, outcome.year, &outcome.coeffs)?;
                    }
                    Ok(())
                },
            )?;
        }

        let means: Vec<Observables> = accumulators.iter().map(Accumulator::mean).collect();
        let scores = score_combination(&means, &observed, fmatch);
        reports.control_stats.append(run, &scores, &combo)?;

        if let Some(avg) = reports.avg.as_mut() {
            for (&year, mean) in scoring_years.iter().zip(&means) {
                avg.append(run, year, mean)?;
            }
        }
        if let Some(table) = reports.std_dev.as_mut() {
            for (&year, acc) in scoring_years.iter().zip(&accumulators) {
                table.append(run, year, &acc.std_dev())?;
            }
        }
        if let Some(path) = &reports.restart_path {
            write_restart(
                path,
                &RestartRecord {
                    coeffs: combo,
                    random_seed: scenario.random_seed,
                    counter: run + 1,
                },
            )?;
        }

        if scores.product > best.product {
            best = BestFit {
                combo,
                product: scores.product,
            };
        }

        if let Some(bar) = progress {
            bar.inc();
        }
    }

    reports.control_stats.flush()?;
    if let Some(log) = reports.coeff_log.as_mut() {
        log.flush()?;
    }
    if let Some(avg) = reports.avg.as_mut() {
        avg.flush()?;
    }
    if let Some(table) = reports.std_dev.as_mut() {
        table.flush()?;
    }
    arena.verify_drained()?;

    Ok(best)
}

fn default_probability_colors() -> Vec<ProbabilityColor> {
    // Green through red in ten percent steps.
    (0..10)
        .map(|k| ProbabilityColor {
            lower: (k * 10 + 1) as u8,
            upper: ((k + 1) * 10) as u8,
            color: [(k * 28) as u8, (255 - k * 25) as u8, 0],
        })
        .collect()
}

fn probability_palette(scenario: &Scenario) -> (RemapTable, ColorTable) {
    let buckets = if scenario.probability_colors.is_empty() {
        default_probability_colors()
    } else {
        scenario.probability_colors.clone()
    };

    let intervals = buckets
        .iter()
        .take((255 - PROB_INDEX_BASE) as usize)
        .enumerate()
        .map(|(k, bucket)| RemapInterval {
            lower: bucket.lower,
            upper: bucket.upper,
            index: PROB_INDEX_BASE + k as u8,
        })
        .collect();

    let mut colors = ColorTable::new();
    for (k, bucket) in buckets.iter().enumerate() {
        colors.set(PROB_INDEX_BASE + k as u8, bucket.color);
    }
    colors.set(WATER_INDEX, scenario.water_color);
    colors.set(SEED_INDEX, scenario.seed_color);
    colors.set(DATE_INDEX, scenario.date_color);

    (RemapTable::new(intervals), colors)
}

/// Compose one probability image: squashed background, water mask,
/// probability overlay, seed overlay, and date stamp
fn compose_probability_image(
    prob: &PixelGrid,
    seed_layer: &PixelGrid,
    excluded: &PixelGrid,
    background: &PixelGrid,
    prob_remap: &RemapTable,
    year: u32,
) -> PixelGrid {
    let (nrows, ncols) = prob.dim();

    // Keep the background clear of the reserved overlay band.
    let background_remap = RemapTable::new(vec![RemapInterval {
        lower: BACKGROUND_CEILING,
        upper: 255,
        index: BACKGROUND_CEILING - 1,
    }]);
    let mut image = PixelGrid::new(nrows, ncols);
    background.remap(&background_remap, &mut image);

    let mut water = PixelGrid::new(nrows, ncols);
    water.conditional_set(excluded, Comparator::Ge, EXCLUDED, WATER_INDEX);
    image.overlay_with(&water);

    let mut overlay = PixelGrid::new(nrows, ncols);
    prob.remap(prob_remap, &mut overlay);
    // Probability zero passes through the remap; mask it out.
    let mut masked = PixelGrid::new(nrows, ncols);
    masked.conditional_set(prob, Comparator::Gt, 0, 1);
    let mut prob_overlay = PixelGrid::new(nrows, ncols);
    for ((i, j), flag) in masked.indexed_iter() {
        if flag > 0 {
            prob_overlay.set(i, j, overlay.get(i, j));
        }
    }
    image.overlay_with(&prob_overlay);

    let mut seed_overlay = PixelGrid::new(nrows, ncols);
    seed_overlay.conditional_set(seed_layer, Comparator::Gt, 0, SEED_INDEX);
    image.overlay_with(&seed_overlay);

    stamp_date(&mut image, year, DATE_INDEX);
    image
}

/// Project future urban extent from the best-fit coefficients
///
/// Runs M replications from the latest control year to the prediction stop
/// date and writes one probability GIF per predicted year, where each
/// pixel holds the percent of replications that urbanized it.
///
/// # Errors
///
/// Returns an error when the prediction window is empty, a replication
/// fails, or an image cannot be written.
pub fn run_prediction(
    landscape: &Landscape,
    scenario: &Scenario,
    progress: Option<&SweepProgress>,
) -> Result<()> {
    let start_year = landscape.latest_urban().year;
    let stop_year = scenario.prediction_stop_date;
    if stop_year <= start_year {
        return Err(invalid_parameter(
            "PREDICTION_STOP_DATE",
            &stop_year,
            &format!("must be after the latest urban year {start_year}"),
        ));
    }

    let mc = scenario.monte_carlo_iterations;
    let years: Vec<u32> = (start_year + 1..=stop_year).collect();
    let mut counts: Vec<ValueGrid<u32>> = years
        .iter()
        .map(|_| ValueGrid::new(landscape.nrows(), landscape.ncols()))
        .collect();

    let mut proc = Processor::new(Mode::Predict, 1, mc);
    let mut arena = GridArena::new(WORKING_GRIDS, landscape.nrows(), landscape.ncols());
    let mut coeffs =
        CoefficientSet::new(scenario.start, scenario.stop, scenario.step, scenario.best_fit)?;
    coeffs.set_current(scenario.best_fit);
    let config = replication_config(scenario);

    for m in 0..mc {
        proc.set_monte_carlo(m);
        let seed = scenario.random_seed ^ m as u64;
        let year_counts = &mut counts;
        let year_list = &years;
        run_replication(
            landscape,
            &mut arena,
            &mut coeffs,
            &config,
            &mut proc,
            &landscape.latest_urban().grid,
            start_year,
            stop_year,
            seed,
            |z, outcome| {
                if let Some(k) = year_list.iter().position(|&y| y == outcome.year) {
                    if let Some(grid) = year_counts.get_mut(k) {
                        for ((i, j), value) in z.indexed_iter() {
                            if value > 0 {
                                grid.set(i, j, grid.get(i, j) + 1);
                            }
                        }
                    }
                }
                Ok(())
            },
        )?;
        if let Some(bar) = progress {
            bar.inc();
        }
    }

    let (prob_remap, colors) = probability_palette(scenario);
    let first_display = scenario
        .prediction_start_date
        .max(start_year + 1);

    for (&year, count_grid) in years.iter().zip(&counts) {
        if year < first_display {
            continue;
        }
        let mut prob = PixelGrid::new(landscape.nrows(), landscape.ncols());
        for ((i, j), count) in count_grid.indexed_iter() {
            let percent = (count as usize * 100 / mc).min(100) as u8;
            prob.set(i, j, percent);
        }
        let image = compose_probability_image(
            &prob,
            &landscape.latest_urban().grid,
            landscape.excluded(),
            landscape.background(),
            &prob_remap,
            year,
        );
        let path = scenario
            .output_dir
            .join(format!("probability.{year}.gif"));
        write_grid_gif(&image, &colors, &path)?;
    }

    arena.verify_drained()
}

/// Single-combination shakedown run
///
/// Uses the sweep start values for one pass and writes a phase coloured
/// image of the final replication's extent, which makes the growth rules
/// individually visible. With `VIEW_GROWTH_TYPES=yes` every year of the
/// final replication is written instead of only the last.
///
/// # Errors
///
/// Returns an error when the replications or image output fail.
pub fn run_test(landscape: &Landscape, scenario: &Scenario) -> Result<()> {
    let years = landscape.urban_years();
    let start_year = years[0];
    let stop_year = years[years.len() - 1].max(start_year + 1);

    let mc = scenario.monte_carlo_iterations;
    let mut proc = Processor::new(Mode::Test, 1, mc);
    let mut arena = GridArena::new(WORKING_GRIDS, landscape.nrows(), landscape.ncols());
    let mut coeffs =
        CoefficientSet::new(scenario.start, scenario.stop, scenario.step, scenario.best_fit)?;
    coeffs.set_current(scenario.start);
    let config = replication_config(scenario);

    let mut final_z = PixelGrid::new(landscape.nrows(), landscape.ncols());
    let mut yearly: Vec<(u32, PixelGrid)> = Vec::new();
    for m in 0..mc {
        proc.set_monte_carlo(m);
        let seed = scenario.random_seed ^ m as u64;
        let last = &mut final_z;
        let capture_years = scenario.view_growth_types && m + 1 == mc;
        let snapshots = &mut yearly;
        run_replication(
            landscape,
            &mut arena,
            &mut coeffs,
            &config,
            &mut proc,
            &landscape.earliest_urban().grid,
            start_year,
            stop_year,
            seed,
            |z, outcome| {
                if outcome.year == stop_year {
                    last.copy_from(z);
                }
                if capture_years {
                    snapshots.push((outcome.year, z.clone()));
                }
                Ok(())
            },
        )?;
    }

    let mut colors = ColorTable::new();
    colors.set(URBAN_SEED, scenario.seed_color);
    colors.set(PHASE1G, [255, 255, 0]);
    colors.set(PHASE2G, [255, 128, 0]);
    colors.set(PHASE3G, [255, 0, 0]);
    colors.set(PHASE4G, [0, 128, 255]);
    colors.set(PHASE5G, [0, 255, 255]);
    colors.set(DATE_INDEX, scenario.date_color);

    for (year, mut snapshot) in yearly {
        stamp_date(&mut snapshot, year, DATE_INDEX);
        let path = scenario
            .output_dir
            .join(format!("{}.{year}.gif", Mode::Test.name()));
        write_grid_gif(&snapshot, &colors, &path)?;
    }

    let mut image = final_z;
    stamp_date(&mut image, stop_year, DATE_INDEX);
    let path = scenario
        .output_dir
        .join(format!("{}.{stop_year}.gif", Mode::Test.name()));
    write_grid_gif(&image, &colors, &path)?;

    arena.verify_drained()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_enumerates_the_cartesian_product() {
        let mut start = CoeffInts::splat(1);
        let mut stop = CoeffInts::splat(1);
        let step = CoeffInts::splat(1);
        start.diffusion = 10;
        stop.diffusion = 30;
        stop.road_gravity = 2;
        let mut sweep_step = step;
        sweep_step.diffusion = 10;

        let sweep = CoeffSweep::new(start, stop, sweep_step);
        assert_eq!(sweep.combination_count(), 6);
        let combos: Vec<CoeffInts> = sweep.collect();
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0].diffusion, 10);
        assert_eq!(combos[0].road_gravity, 1);
        // Road gravity varies fastest.
        assert_eq!(combos[1].diffusion, 10);
        assert_eq!(combos[1].road_gravity, 2);
        assert_eq!(combos[2].diffusion, 20);
        assert_eq!(combos[5].diffusion, 30);
        assert_eq!(combos[5].road_gravity, 2);
    }

    #[test]
    fn single_point_sweep_yields_one_combination() {
        let sweep = CoeffSweep::new(
            CoeffInts::splat(50),
            CoeffInts::splat(50),
            CoeffInts::splat(1),
        );
        assert_eq!(sweep.combination_count(), 1);
        assert_eq!(sweep.collect::<Vec<_>>().len(), 1);
    }

    #[test]
    fn compare_ratio_is_symmetric_and_bounded() {
        assert!((population_compare(50.0, 100.0) - 0.5).abs() < 1e-12);
        assert!((population_compare(100.0, 50.0) - 0.5).abs() < 1e-12);
        assert_eq!(population_compare(0.0, 0.0), 1.0);
        assert_eq!(population_compare(0.0, 10.0), 0.0);
    }

    #[test]
    fn default_probability_buckets_cover_one_to_hundred() {
        let buckets = default_probability_colors();
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0].lower, 1);
        assert_eq!(buckets[9].upper, 100);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].upper + 1, pair[1].lower);
        }
    }

    #[test]
    fn perfect_simulation_scores_product_one() {
        let observed = vec![
            Observables {
                pop: 10.0,
                edges: 4.0,
                clusters: 1.0,
                mean_cluster_size: 10.0,
                average_slope: 2.0,
                percent_urban: 1.0,
                xmean: 5.0,
                ymean: 5.0,
                radial_spread: 2.0,
                lee_sallee: 1.0,
            },
            Observables {
                pop: 20.0,
                edges: 8.0,
                clusters: 2.0,
                mean_cluster_size: 11.0,
                average_slope: 3.0,
                percent_urban: 2.0,
                xmean: 6.0,
                ymean: 7.0,
                radial_spread: 3.0,
                lee_sallee: 1.0,
            },
        ];
        let mut simulated = observed.clone();
        for obs in &mut simulated {
            obs.lee_sallee = 1.0;
        }
        let scores = score_combination(&simulated, &observed, 1.0);
        assert!((scores.product - 1.0).abs() < 1e-9, "product {}", scores.product);
    }
}
