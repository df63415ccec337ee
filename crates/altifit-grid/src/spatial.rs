//! Two-dimensional node layout built from a pair of axes.

use crate::axis::Grid;
use crate::error::GridError;
use crate::extent::Extent;

/// The (x, y) node lattice of a fit.
///
/// Nodes are enumerated row-major: rows follow `y`, columns follow `x`, so
/// flat index `row * nx + col` addresses node `(x[col], y[row])`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialGrid {
    x: Grid,
    y: Grid,
}

impl SpatialGrid {
    /// Pair two existing axes.
    pub fn new(x: Grid, y: Grid) -> Self {
        Self { x, y }
    }

    /// Square lattice of side `width` centred on `center`.
    ///
    /// # Errors
    ///
    /// Propagates [`GridError`] from either axis.
    pub fn centered(center: (f64, f64), width: f64, spacing: f64) -> Result<Self, GridError> {
        let half = width / 2.0;
        let x = Grid::new("x", (center.0 - half, center.0 + half), spacing)?;
        let y = Grid::new("y", (center.1 - half, center.1 + half), spacing)?;
        Ok(Self { x, y })
    }

    /// The x axis.
    pub fn x(&self) -> &Grid {
        &self.x
    }

    /// The y axis.
    pub fn y(&self) -> &Grid {
        &self.y
    }

    /// `(ny, nx)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Total node count.
    pub fn node_count(&self) -> usize {
        self.x.len() * self.y.len()
    }

    /// Coordinates of node `(row, col)`, or `None` out of range.
    pub fn node(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        let x = *self.x.ctrs().get(col)?;
        let y = *self.y.ctrs().get(row)?;
        Some((x, y))
    }

    /// Flattened node coordinates in row-major order.
    pub fn mesh(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.node_count();
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for &y in self.y.ctrs() {
            for &x in self.x.ctrs() {
                xs.push(x);
                ys.push(y);
            }
        }
        (xs, ys)
    }

    /// Box spanned by the node centers.
    pub fn extent(&self) -> Extent {
        let xc = self.x.ctrs();
        let yc = self.y.ctrs();
        Extent::new(
            (xc[0], xc[xc.len() - 1]),
            (yc[0], yc[yc.len() - 1]),
        )
    }
}
