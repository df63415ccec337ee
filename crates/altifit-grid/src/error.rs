//! Error types for grid construction.

use std::fmt;

/// Errors arising from grid construction.
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Spacing is not positive, or the bounds are empty or non-finite.
    InvalidSpacing {
        /// Axis name.
        name: String,
        /// Requested lower bound.
        lo: f64,
        /// Requested upper bound.
        hi: f64,
        /// Requested spacing.
        spacing: f64,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpacing {
                name,
                lo,
                hi,
                spacing,
            } => write!(
                f,
                "invalid grid '{name}': bounds [{lo}, {hi}] with spacing {spacing}"
            ),
        }
    }
}

impl std::error::Error for GridError {}
