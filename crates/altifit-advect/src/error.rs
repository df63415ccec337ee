//! Error types for the Lagrangian frame.

use std::error::Error;
use std::fmt;

use altifit_core::SchemaError;
use altifit_grid::GridError;
use altifit_velocity::VelocityError;

/// Errors that abort a Lagrangian run.
///
/// Per-point outcomes (a parcel leaving the domain, or leaving velocity
/// coverage) are not errors; they are counted in
/// [`DataAdvectionReport`](crate::DataAdvectionReport).
#[derive(Debug, Clone, PartialEq)]
pub enum LagrangianError {
    /// A configuration value is out of range.
    Configuration {
        /// Which value and why.
        reason: String,
    },
    /// Grid construction failed.
    Grid(GridError),
    /// Velocity ingestion failed.
    Velocity(VelocityError),
    /// Velocity is undefined inside the buffered domain after gap filling.
    DataCoverage {
        /// Epoch of the first failing slice, seconds from the reference epoch.
        epoch: f64,
        /// Number of undefined samples.
        cells: usize,
        /// Map coordinates of the first undefined sample.
        first: (f64, f64),
    },
    /// A solved grid does not match the displacement field.
    ShapeMismatch {
        /// Displacement shape `(ny, nx, nt)`.
        expected: (usize, usize, usize),
        /// Solved grid shape.
        found: (usize, usize, usize),
    },
    /// Observation columns were malformed.
    Schema(SchemaError),
}

impl fmt::Display for LagrangianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { reason } => write!(f, "invalid lagrangian config: {reason}"),
            Self::Grid(e) => write!(f, "grid: {e}"),
            Self::Velocity(e) => write!(f, "velocity: {e}"),
            Self::DataCoverage {
                epoch,
                cells,
                first,
            } => write!(
                f,
                "velocity coverage incomplete: {cells} samples undefined in the buffered domain \
                 (first at t={epoch}s, x={}, y={})",
                first.0, first.1
            ),
            Self::ShapeMismatch { expected, found } => write!(
                f,
                "solved grid shape {found:?} does not match displacement shape {expected:?}"
            ),
            Self::Schema(e) => write!(f, "schema: {e}"),
        }
    }
}

impl Error for LagrangianError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Grid(e) => Some(e),
            Self::Velocity(e) => Some(e),
            Self::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for LagrangianError {
    fn from(e: GridError) -> Self {
        Self::Grid(e)
    }
}

impl From<VelocityError> for LagrangianError {
    fn from(e: VelocityError) -> Self {
        match e {
            VelocityError::UnfillableGap {
                epoch,
                cells,
                first,
            } => Self::DataCoverage {
                epoch,
                cells,
                first,
            },
            other => Self::Velocity(other),
        }
    }
}

impl From<SchemaError> for LagrangianError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}
