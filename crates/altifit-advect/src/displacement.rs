//! Per-node displacement of the output grid across epochs.

/// `(ny, nx, nt)` displacement of every grid node at every output epoch.
///
/// Layout matches [`SolvedGrid`](altifit_grid::SolvedGrid): epoch axis
/// fastest. NaN entries mark nodes whose trajectory left velocity coverage.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplacementField {
    ny: usize,
    nx: usize,
    nt: usize,
    dx: Vec<f64>,
    dy: Vec<f64>,
}

impl DisplacementField {
    /// Field of the given shape with every entry NaN.
    pub fn new(ny: usize, nx: usize, nt: usize) -> Self {
        let n = ny * nx * nt;
        Self {
            ny,
            nx,
            nt,
            dx: vec![f64::NAN; n],
            dy: vec![f64::NAN; n],
        }
    }

    /// `(ny, nx, nt)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.ny, self.nx, self.nt)
    }

    /// Store epoch `k` from node-ordered (row-major) displacements.
    pub(crate) fn set_epoch(&mut self, k: usize, dx: &[f64], dy: &[f64]) {
        for (node, (&a, &b)) in dx.iter().zip(dy).enumerate() {
            let i = node * self.nt + k;
            self.dx[i] = a;
            self.dy[i] = b;
        }
    }

    /// Eastward displacement at `(row, col, k)`.
    pub fn dx_at(&self, row: usize, col: usize, k: usize) -> f64 {
        self.dx[(row * self.nx + col) * self.nt + k]
    }

    /// Northward displacement at `(row, col, k)`.
    pub fn dy_at(&self, row: usize, col: usize, k: usize) -> f64 {
        self.dy[(row * self.nx + col) * self.nt + k]
    }

    /// Flat eastward displacement.
    pub fn dx(&self) -> &[f64] {
        &self.dx
    }

    /// Flat northward displacement.
    pub fn dy(&self) -> &[f64] {
        &self.dy
    }

    /// Number of nodes with an undefined displacement at any epoch.
    pub fn unresolved_nodes(&self) -> usize {
        self.dx
            .chunks(self.nt.max(1))
            .zip(self.dy.chunks(self.nt.max(1)))
            .filter(|(a, b)| a.iter().chain(b.iter()).any(|v| !v.is_finite()))
            .count()
    }

    /// Finite `(min, max)` of `dx` and of `dy`, or `None` if nothing is finite.
    pub fn range(&self) -> Option<((f64, f64), (f64, f64))> {
        Some((finite_range(&self.dx)?, finite_range(&self.dy)?))
    }

    pub(crate) fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.dx, self.dy)
    }
}

pub(crate) fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
