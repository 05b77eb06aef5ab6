//! Text report writers: control statistics, coefficient log, avg/std tables

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::analysis::observables::Observables;
use crate::engine::coefficients::{CoeffInts, Coefficients};
use crate::io::error::{Result, SimError};

/// The thirteen goodness-of-fit fields recorded per coefficient combination
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    /// Product of the twelve individual scores, the overall fit
    pub product: f64,
    /// Final-year population ratio between simulation and observation
    pub compare: f64,
    /// Urban count fit across control years
    pub pop: f64,
    /// Edge count fit
    pub edges: f64,
    /// Cluster count fit
    pub clusters: f64,
    /// Mean cluster size fit
    pub cluster_size: f64,
    /// Averaged spatial agreement with the control masks
    pub lee_sallee: f64,
    /// Mean slope fit
    pub slope: f64,
    /// Percent urban fit
    pub percent_urban: f64,
    /// Centroid x fit
    pub xmean: f64,
    /// Centroid y fit
    pub ymean: f64,
    /// Radial spread fit
    pub rad: f64,
    /// Land-use class agreement at the final control year
    pub fmatch: f64,
}

impl Scores {
    /// Multiply the twelve scores into the overall fit product
    pub fn with_product(mut self) -> Self {
        self.product = self.compare
            * self.pop
            * self.edges
            * self.clusters
            * self.cluster_size
            * self.lee_sallee
            * self.slope
            * self.percent_urban
            * self.xmean
            * self.ymean
            * self.rad
            * self.fmatch;
        self
    }
}

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SimError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create directory",
                source: e,
            })?;
        }
    }
    let file = File::create(path).map_err(|e| SimError::FileSystem {
        path: path.to_path_buf(),
        operation: "create file",
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

fn write_failure(path: &Path, source: std::io::Error) -> SimError {
    SimError::FileSystem {
        path: path.to_path_buf(),
        operation: "write report",
        source,
    }
}

/// Appends one scored row per coefficient combination
pub struct ControlStatsWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl ControlStatsWriter {
    /// Create the file and write the column header
    ///
    /// # Errors
    ///
    /// Returns a file system error when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = create_writer(path)?;
        writeln!(
            writer,
            "run product compare pop edges clusters size leesalee slope \
             pct_urban xmean ymean rad fmatch diff brd sprd slp rg"
        )
        .map_err(|e| write_failure(path, e))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append one combination's scores and coefficients
    ///
    /// # Errors
    ///
    /// Returns a file system error when the row cannot be written.
    pub fn append(&mut self, run: usize, scores: &Scores, coeffs: &CoeffInts) -> Result<()> {
        writeln!(
            self.writer,
            "{run} {:.5} {:.5} {:.5} {:.5} {:.5} {:.5} {:.5} {:.5} {:.5} \
             {:.5} {:.5} {:.5} {:.5} {} {} {} {} {}",
            scores.product,
            scores.compare,
            scores.pop,
            scores.edges,
            scores.clusters,
            scores.cluster_size,
            scores.lee_sallee,
            scores.slope,
            scores.percent_urban,
            scores.xmean,
            scores.ymean,
            scores.rad,
            scores.fmatch,
            coeffs.diffusion,
            coeffs.breed,
            coeffs.spread,
            coeffs.slope_resistance,
            coeffs.road_gravity
        )
        .map_err(|e| write_failure(&self.path, e))
    }

    /// Flush buffered rows to disk
    ///
    /// # Errors
    ///
    /// Returns a file system error when the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| write_failure(&self.path, e))
    }
}

/// Writes one coefficient tuple per simulated year
pub struct CoefficientLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl CoefficientLog {
    /// Create the log file and write the column header
    ///
    /// # Errors
    ///
    /// Returns a file system error when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = create_writer(path)?;
        writeln!(
            writer,
            "run mc year diffusion breed spread slope_resistance road_gravity"
        )
        .map_err(|e| write_failure(path, e))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append one year's live coefficient tuple
    ///
    /// # Errors
    ///
    /// Returns a file system error when the line cannot be written.
    pub fn append(&mut self, run: usize, mc: usize, year: u32, coeffs: &Coefficients) -> Result<()> {
        writeln!(
            self.writer,
            "{run} {mc} {year} {:.4} {:.4} {:.4} {:.4} {:.4}",
            coeffs.diffusion,
            coeffs.breed,
            coeffs.spread,
            coeffs.slope_resistance,
            coeffs.road_gravity
        )
        .map_err(|e| write_failure(&self.path, e))
    }

    /// Flush buffered lines to disk
    ///
    /// # Errors
    ///
    /// Returns a file system error when the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| write_failure(&self.path, e))
    }
}

/// Writes per-combination tables of averaged or deviation observables
pub struct ObservableTable {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl ObservableTable {
    /// Create the table file and write the column header
    ///
    /// # Errors
    ///
    /// Returns a file system error when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = create_writer(path)?;
        write!(writer, "run year").map_err(|e| write_failure(path, e))?;
        for name in Observables::FIELD_NAMES {
            write!(writer, " {name}").map_err(|e| write_failure(path, e))?;
        }
        writeln!(writer).map_err(|e| write_failure(path, e))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append one control year's values for a combination
    ///
    /// # Errors
    ///
    /// Returns a file system error when the row cannot be written.
    pub fn append(&mut self, run: usize, year: u32, values: &Observables) -> Result<()> {
        write!(self.writer, "{run} {year}").map_err(|e| write_failure(&self.path, e))?;
        for value in values.to_array() {
            write!(self.writer, " {value:.4}").map_err(|e| write_failure(&self.path, e))?;
        }
        writeln!(self.writer).map_err(|e| write_failure(&self.path, e))
    }

    /// Flush buffered rows to disk
    ///
    /// # Errors
    ///
    /// Returns a file system error when the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| write_failure(&self.path, e))
    }
}
