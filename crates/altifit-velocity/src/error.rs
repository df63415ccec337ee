//! Error types for velocity ingestion and gap filling.

use std::error::Error;
use std::fmt;

use altifit_grid::Extent;

/// Errors arising while loading or preparing a velocity field.
#[derive(Debug, Clone, PartialEq)]
pub enum VelocityError {
    /// The ingest contained no products.
    MissingSource,
    /// An array did not have the length implied by its axes.
    ShapeMismatch {
        /// Which array was malformed.
        what: String,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        found: usize,
    },
    /// A product's axes could not be combined with the rest of the ingest.
    IncompatibleFootprint {
        /// Product name.
        name: String,
        /// What did not match.
        reason: String,
    },
    /// The crop window does not overlap the product coverage.
    EmptyCrop {
        /// Requested window (buffer included).
        window: Extent,
    },
    /// Velocity samples remain undefined inside the query region after
    /// gap filling.
    UnfillableGap {
        /// Epoch (in the field's time base) of the first failing slice.
        epoch: f64,
        /// Number of undefined samples inside the region, all epochs.
        cells: usize,
        /// Map coordinates of the first undefined sample.
        first: (f64, f64),
    },
    /// Epochs have already been converted to seconds offsets.
    AlreadyNormalized {
        /// Reference epoch used by the earlier normalization.
        reference: f64,
    },
    /// A product reader failed.
    Source {
        /// Product name.
        name: String,
        /// Reader-supplied reason.
        reason: String,
    },
}

impl fmt::Display for VelocityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSource => write!(f, "no velocity products supplied"),
            Self::ShapeMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "velocity array '{what}' has {found} elements, expected {expected}"
            ),
            Self::IncompatibleFootprint { name, reason } => {
                write!(f, "velocity product '{name}' is incompatible: {reason}")
            }
            Self::EmptyCrop { window } => write!(
                f,
                "crop window x=[{}, {}] y=[{}, {}] does not overlap velocity coverage",
                window.x.0, window.x.1, window.y.0, window.y.1
            ),
            Self::UnfillableGap {
                epoch,
                cells,
                first,
            } => write!(
                f,
                "{cells} velocity samples undefined inside the domain after gap filling \
                 (first at epoch {epoch}, x={}, y={})",
                first.0, first.1
            ),
            Self::AlreadyNormalized { reference } => write!(
                f,
                "velocity epochs already normalized to reference epoch {reference}"
            ),
            Self::Source { name, reason } => {
                write!(f, "failed to read velocity product '{name}': {reason}")
            }
        }
    }
}

impl Error for VelocityError {}
