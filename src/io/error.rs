//! Error types for simulation, calibration, and file operations

use std::fmt;
use std::path::PathBuf;

/// Main error type for all engine operations
#[derive(Debug)]
pub enum SimError {
    /// Malformed or incomplete scenario configuration
    Scenario {
        /// Scenario file being parsed
        path: PathBuf,
        /// Line number where parsing failed, when known
        line: Option<usize>,
        /// Description of what is wrong
        reason: String,
    },

    /// Failed to load an input raster from the filesystem
    RasterLoad {
        /// Path to the raster file
        path: PathBuf,
        /// Underlying image decoding error
        source: image::ImageError,
    },

    /// Input raster shape differs from the first-loaded raster
    ShapeMismatch {
        /// Path to the offending raster
        path: PathBuf,
        /// Shape established by the first raster (rows, cols)
        expected: (usize, usize),
        /// Shape of the offending raster (rows, cols)
        found: (usize, usize),
    },

    /// Grid lease or release violated the arena discipline
    ///
    /// Always indicates an engine bug, never a user error.
    Resource {
        /// Description of the violated invariant
        reason: String,
    },

    /// Parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Failed to encode or save an output image
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Restart file exists but does not hold seven integers
    Restart {
        /// Path to the restart file
        path: PathBuf,
        /// Description of the failure
        reason: String,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scenario { path, line, reason } => match line {
                Some(n) => {
                    write!(f, "Scenario '{}' line {n}: {reason}", path.display())
                }
                None => write!(f, "Scenario '{}': {reason}", path.display()),
            },
            Self::RasterLoad { path, source } => {
                write!(f, "Failed to load raster '{}': {source}", path.display())
            }
            Self::ShapeMismatch {
                path,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Raster '{}' is {}x{} but the first input was {}x{}",
                    path.display(),
                    found.0,
                    found.1,
                    expected.0,
                    expected.1
                )
            }
            Self::Resource { reason } => {
                write!(f, "Grid arena violation: {reason}")
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
            Self::Restart { path, reason } => {
                write!(f, "Restart file '{}': {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RasterLoad { source, .. } | Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for engine results
pub type Result<T> = std::result::Result<T, SimError>;

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> SimError {
    SimError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a resource discipline error
pub fn resource_error(reason: &impl ToString) -> SimError {
    SimError::Resource {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_both_shapes() {
        let err = SimError::ShapeMismatch {
            path: PathBuf::from("roads.gif"),
            expected: (50, 80),
            found: (50, 81),
        };
        let msg = err.to_string();
        assert!(msg.contains("50x81"));
        assert!(msg.contains("50x80"));
    }

    #[test]
    fn scenario_error_includes_line() {
        let err = SimError::Scenario {
            path: PathBuf::from("scenario.cfg"),
            line: Some(12),
            reason: "unknown key".to_string(),
        };
        assert!(err.to_string().contains("line 12"));
    }
}
