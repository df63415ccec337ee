//! Velocity products and the readers that supply them.

use altifit_grid::Extent;

use crate::error::VelocityError;

/// How densely a product samples time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingDensity {
    /// A single mosaic or a densely sampled series; smooth enough for
    /// bicubic sampling.
    Dense,
    /// A sparse time series; sampled bilinearly.
    Sparse,
}

/// One velocity product as read from disk.
///
/// Sample arrays are flat `[epoch][row][col]` with rows following `y` and
/// columns following `x`, in whatever order the axes are stored natively
/// (ascending or descending).
#[derive(Clone, Debug, PartialEq)]
pub struct VelocityProduct {
    /// Column coordinates.
    pub x: Vec<f64>,
    /// Row coordinates.
    pub y: Vec<f64>,
    /// Epochs in decimal years.
    pub epochs: Vec<f64>,
    /// Eastward velocity, m/yr.
    pub u: Vec<f64>,
    /// Northward velocity, m/yr.
    pub v: Vec<f64>,
    /// Uncertainty of `u`, m/yr.
    pub eu: Option<Vec<f64>>,
    /// Uncertainty of `v`, m/yr.
    pub ev: Option<Vec<f64>>,
    /// Time sampling of the product.
    pub density: SamplingDensity,
}

/// A reader for one velocity product.
pub trait VelocitySource {
    /// Human-readable product name used in logs and errors.
    fn name(&self) -> &str;

    /// Read the product.
    ///
    /// `window` is a hint: readers may restrict I/O to it, but the field
    /// crops the result itself, so returning the full product is correct.
    fn read(&self, window: Option<&Extent>) -> Result<VelocityProduct, VelocityError>;
}

/// The set of products that make up one velocity field.
pub enum VelocityIngest {
    /// One product, possibly holding several epochs.
    SingleGrid(Box<dyn VelocitySource>),
    /// Several products on a shared footprint, one or more epochs each.
    MultiFile(Vec<Box<dyn VelocitySource>>),
}

impl std::fmt::Debug for VelocityIngest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleGrid(s) => f.debug_tuple("SingleGrid").field(&s.name()).finish(),
            Self::MultiFile(sources) => f
                .debug_tuple("MultiFile")
                .field(&sources.iter().map(|s| s.name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}
