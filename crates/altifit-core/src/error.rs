//! Schema errors for the observation column store.

use std::error::Error;
use std::fmt;

/// Errors arising from column assignment, removal, or row filtering on an
/// [`ObservationSet`](crate::ObservationSet).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaError {
    /// A column does not have the same length as the rest of the set.
    LengthMismatch {
        /// Name of the offending column.
        field: String,
        /// Row count of the set.
        expected: usize,
        /// Length of the supplied column.
        found: usize,
    },
    /// A required column is absent from the input.
    MissingField {
        /// Name of the missing column.
        name: String,
    },
    /// Attempted to remove one of the required columns.
    RequiredField {
        /// Name of the required column.
        name: String,
    },
    /// A row mask does not match the row count.
    MaskLength {
        /// Row count of the set.
        expected: usize,
        /// Length of the supplied mask.
        found: usize,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "column '{field}' has {found} rows, expected {expected}"
            ),
            Self::MissingField { name } => write!(f, "missing required column '{name}'"),
            Self::RequiredField { name } => write!(f, "column '{name}' is required"),
            Self::MaskLength { expected, found } => {
                write!(f, "row mask has {found} entries, expected {expected}")
            }
        }
    }
}

impl Error for SchemaError {}
