//! Gridded results returned by the surface fit.

/// A named `(ny, nx, nt)` result grid.
///
/// Values are flat with the epoch axis fastest: `(row * nx + col) * nt + k`.
/// Static grids (such as a reference surface) have no time axis and
/// `nt == 1`. A grid may carry the per-node displacement of a Lagrangian
/// run in `dx`/`dy`, laid out like `values`.
#[derive(Clone, Debug, PartialEq)]
pub struct SolvedGrid {
    /// Column coordinates.
    pub x: Vec<f64>,
    /// Row coordinates.
    pub y: Vec<f64>,
    /// Epoch coordinates, absent for static grids.
    pub t: Option<Vec<f64>>,
    /// Solved values.
    pub values: Vec<f64>,
    /// Eastward node displacement, Lagrangian runs only.
    pub dx: Option<Vec<f64>>,
    /// Northward node displacement, Lagrangian runs only.
    pub dy: Option<Vec<f64>>,
}

impl SolvedGrid {
    /// Grid of `fill` on the given axes.
    pub fn filled(x: Vec<f64>, y: Vec<f64>, t: Option<Vec<f64>>, fill: f64) -> Self {
        let nt = t.as_ref().map_or(1, Vec::len);
        let values = vec![fill; x.len() * y.len() * nt];
        Self {
            x,
            y,
            t,
            values,
            dx: None,
            dy: None,
        }
    }

    /// `(ny, nx, nt)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (
            self.y.len(),
            self.x.len(),
            self.t.as_ref().map_or(1, Vec::len),
        )
    }

    /// Value at `(row, col, k)`, or `None` out of range.
    pub fn get(&self, row: usize, col: usize, k: usize) -> Option<f64> {
        let (ny, nx, nt) = self.shape();
        if row >= ny || col >= nx || k >= nt {
            return None;
        }
        self.values.get((row * nx + col) * nt + k).copied()
    }

    /// Whether the displacement layers are attached.
    pub fn has_displacement(&self) -> bool {
        self.dx.is_some() && self.dy.is_some()
    }
}
