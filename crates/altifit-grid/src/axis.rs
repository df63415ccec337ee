//! One-dimensional finite-difference axis.

use crate::error::GridError;

/// Relative tolerance under which `(hi - lo) / spacing` is treated as an
/// exact integer before the ceiling is taken.
const SNAP_TOLERANCE: f64 = 1e-9;

/// Number of whole steps needed to cover `(hi - lo)`, rounding up.
///
/// Ratios within [`SNAP_TOLERANCE`] (relative) of an integer snap to it, so
/// an exact multiple is not bumped up by floating-point noise.
fn steps(lo: f64, hi: f64, spacing: f64) -> f64 {
    let ratio = (hi - lo) / spacing;
    let nearest = ratio.round();
    if (ratio - nearest).abs() <= SNAP_TOLERANCE * nearest.abs().max(1.0) {
        nearest
    } else {
        ratio.ceil()
    }
}

/// Length of the half-open range `lo, lo + step, ... < hi`.
///
/// Used for the default reference-epoch index of a fit, which counts the
/// output epochs strictly before the end of the time span. Returns 0 for an
/// empty or invalid range.
pub fn span_len(lo: f64, hi: f64, step: f64) -> usize {
    if !(step > 0.0) || !(hi > lo) || !lo.is_finite() || !hi.is_finite() {
        return 0;
    }
    steps(lo, hi, step).max(0.0) as usize
}

/// An evenly spaced coordinate axis.
///
/// Node centers start at the lower bound and step by `spacing`; the node
/// count is `ceil((hi - lo) / spacing) + 1`, so the last center lies within
/// one spacing of the upper bound and may overshoot it when the span is not
/// a whole multiple of the spacing.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    name: String,
    bounds: (f64, f64),
    spacing: f64,
    ctrs: Vec<f64>,
}

impl Grid {
    /// Build an axis over `bounds` with the given spacing.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidSpacing`] if the spacing is not finite and
    /// positive, or if the bounds are non-finite or `hi <= lo`.
    pub fn new(name: impl Into<String>, bounds: (f64, f64), spacing: f64) -> Result<Self, GridError> {
        let name = name.into();
        let (lo, hi) = bounds;
        if !spacing.is_finite() || spacing <= 0.0 || !lo.is_finite() || !hi.is_finite() || hi <= lo
        {
            return Err(GridError::InvalidSpacing {
                name,
                lo,
                hi,
                spacing,
            });
        }
        let n_nodes = steps(lo, hi, spacing) as usize + 1;
        let ctrs = (0..n_nodes).map(|i| lo + i as f64 * spacing).collect();
        Ok(Self {
            name,
            bounds,
            spacing,
            ctrs,
        })
    }

    /// Axis name (`"x"`, `"y"`, `"t"`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The requested `(lo, hi)` bounds.
    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    /// Node spacing.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Node centers in ascending order.
    pub fn ctrs(&self) -> &[f64] {
        &self.ctrs
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.ctrs.len()
    }

    /// Always false: a valid grid has at least two nodes.
    pub fn is_empty(&self) -> bool {
        self.ctrs.is_empty()
    }
}
