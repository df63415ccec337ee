//! Spatial interpolation kernels over a single `[row][col]` plane.

/// Spatial interpolation scheme for velocity sampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationScheme {
    /// Bilinear over the enclosing cell.
    Linear,
    /// Catmull-Rom bicubic over a 4x4 stencil, edges clamped to the grid.
    Cubic,
}

impl std::fmt::Display for InterpolationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

/// Position of `v` on an ascending axis.
///
/// Returns the index `i` of the cell `[axis[i], axis[i + 1]]` containing
/// `v` and the fractional offset within it. `None` when `v` is NaN or
/// outside the axis. The axis must have at least two entries.
pub(crate) fn locate(axis: &[f64], v: f64) -> Option<(usize, f64)> {
    let n = axis.len();
    if n < 2 || !(v >= axis[0] && v <= axis[n - 1]) {
        return None;
    }
    let i = axis.partition_point(|a| *a <= v).saturating_sub(1).min(n - 2);
    let frac = (v - axis[i]) / (axis[i + 1] - axis[i]);
    Some((i, frac))
}

/// Catmull-Rom weights for stencil offsets -1, 0, 1, 2.
fn catmull_rom(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}

/// Sample `plane` (row-major, `nx` columns) at cell `(col, fx)`, `(row, fy)`.
pub(crate) fn sample(
    plane: &[f64],
    nx: usize,
    ny: usize,
    (col, fx): (usize, f64),
    (row, fy): (usize, f64),
    scheme: InterpolationScheme,
) -> f64 {
    match scheme {
        InterpolationScheme::Linear => {
            let at = |r: usize, c: usize| plane[r * nx + c];
            let top = at(row, col) * (1.0 - fx) + at(row, col + 1) * fx;
            let bot = at(row + 1, col) * (1.0 - fx) + at(row + 1, col + 1) * fx;
            top * (1.0 - fy) + bot * fy
        }
        InterpolationScheme::Cubic => {
            let wx = catmull_rom(fx);
            let wy = catmull_rom(fy);
            let mut acc = 0.0;
            for (m, wym) in wy.iter().enumerate() {
                let r = clamp_index(row as isize + m as isize - 1, ny);
                let mut line = 0.0;
                for (k, wxk) in wx.iter().enumerate() {
                    let c = clamp_index(col as isize + k as isize - 1, nx);
                    line += wxk * plane[r * nx + c];
                }
                acc += wym * line;
            }
            acc
        }
    }
}

fn clamp_index(i: isize, n: usize) -> usize {
    i.clamp(0, n as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plane_from(nx: usize, ny: usize, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(nx * ny);
        for r in 0..ny {
            for c in 0..nx {
                out.push(f(c as f64, r as f64));
            }
        }
        out
    }

    #[test]
    fn locate_brackets_and_edges() {
        let axis = [0.0, 1.0, 2.0, 4.0];
        assert_eq!(locate(&axis, 0.0), Some((0, 0.0)));
        assert_eq!(locate(&axis, 1.5), Some((1, 0.5)));
        assert_eq!(locate(&axis, 3.0), Some((2, 0.5)));
        assert_eq!(locate(&axis, 4.0), Some((2, 1.0)));
        assert_eq!(locate(&axis, 4.01), None);
        assert_eq!(locate(&axis, -0.01), None);
        assert_eq!(locate(&axis, f64::NAN), None);
    }

    #[test]
    fn weights_sum_to_one() {
        for t in [0.0, 0.25, 0.5, 0.9, 1.0] {
            let s: f64 = catmull_rom(t).iter().sum();
            assert!((s - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn cubic_hits_nodes_exactly() {
        let p = plane_from(5, 5, |x, y| x * x - 3.0 * y);
        let v = sample(&p, 5, 5, (2, 0.0), (3, 0.0), InterpolationScheme::Cubic);
        assert!((v - (4.0 - 9.0)).abs() < 1e-12);
    }

    #[test]
    fn nan_in_stencil_propagates() {
        let mut p = plane_from(4, 4, |_, _| 1.0);
        p[5] = f64::NAN;
        let v = sample(&p, 4, 4, (1, 0.5), (1, 0.5), InterpolationScheme::Linear);
        assert!(v.is_nan());
    }

    proptest! {
        #[test]
        fn both_schemes_reproduce_constants(fx in 0.0f64..=1.0, fy in 0.0f64..=1.0, c in -500.0f64..500.0) {
            let p = plane_from(4, 4, |_, _| c);
            for scheme in [InterpolationScheme::Linear, InterpolationScheme::Cubic] {
                let v = sample(&p, 4, 4, (0, fx), (2, fy), scheme);
                prop_assert!((v - c).abs() < 1e-9);
            }
        }

        #[test]
        fn interior_linear_field_is_exact(fx in 0.0f64..=1.0, fy in 0.0f64..=1.0) {
            let p = plane_from(6, 6, |x, y| 2.0 * x - 0.5 * y + 7.0);
            let expect = 2.0 * (2.0 + fx) - 0.5 * (2.0 + fy) + 7.0;
            for scheme in [InterpolationScheme::Linear, InterpolationScheme::Cubic] {
                let v = sample(&p, 6, 6, (2, fx), (2, fy), scheme);
                prop_assert!((v - expect).abs() < 1e-9);
            }
        }
    }
}
