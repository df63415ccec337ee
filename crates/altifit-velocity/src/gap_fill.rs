//! Gap filling for velocity sample stacks.
//!
//! Stacks are flat `[epoch][row][col]`. Filling runs in two stages: a
//! temporal pass that linearly interpolates each node's series between
//! finite neighbours in time, then Jacobi passes that replace each
//! remaining undefined sample with the mean of its finite 4-connected
//! neighbours from the previous pass.

use smallvec::SmallVec;

/// Counts from one gap-filling run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GapFillReport {
    /// Samples filled by temporal interpolation.
    pub temporal_filled: usize,
    /// Samples filled by neighbour averaging.
    pub spatial_filled: usize,
    /// Largest number of spatial passes any epoch needed.
    pub passes: usize,
    /// Samples still undefined anywhere in the field.
    pub remaining: usize,
}

impl GapFillReport {
    pub(crate) fn absorb(&mut self, other: &GapFillReport) {
        self.temporal_filled += other.temporal_filled;
        self.spatial_filled += other.spatial_filled;
        self.passes = self.passes.max(other.passes);
        self.remaining += other.remaining;
    }
}

/// Flat indices of the in-bounds 4-connected neighbours of `(r, c)`.
pub(crate) fn neighbours_flat(r: usize, c: usize, rows: usize, cols: usize) -> SmallVec<[usize; 4]> {
    let mut out = SmallVec::new();
    if r > 0 {
        out.push((r - 1) * cols + c);
    }
    if r + 1 < rows {
        out.push((r + 1) * cols + c);
    }
    if c > 0 {
        out.push(r * cols + c - 1);
    }
    if c + 1 < cols {
        out.push(r * cols + c + 1);
    }
    out
}

/// Fill undefined samples bracketed in time by finite samples at the same
/// node. Returns the number of samples filled.
pub(crate) fn fill_temporal(values: &mut [f64], epochs: &[f64], plane_len: usize) -> usize {
    let nt = epochs.len();
    if nt < 3 {
        return 0;
    }
    let mut filled = 0;
    for node in 0..plane_len {
        let mut prev: Option<usize> = None;
        let mut k = 0;
        while k < nt {
            if values[k * plane_len + node].is_finite() {
                prev = Some(k);
                k += 1;
                continue;
            }
            let next = (k + 1..nt).find(|&j| values[j * plane_len + node].is_finite());
            if let (Some(k0), Some(k1)) = (prev, next) {
                let (t0, t1) = (epochs[k0], epochs[k1]);
                let (v0, v1) = (values[k0 * plane_len + node], values[k1 * plane_len + node]);
                for j in k..k1 {
                    let w = (epochs[j] - t0) / (t1 - t0);
                    values[j * plane_len + node] = v0 + w * (v1 - v0);
                    filled += 1;
                }
                prev = Some(k1);
                k = k1 + 1;
            } else {
                match next {
                    Some(k1) => k = k1,
                    None => break,
                }
            }
        }
    }
    filled
}

/// Jacobi neighbour-mean passes over one `[row][col]` plane.
///
/// Returns `(filled, passes)`. Stops when a pass changes nothing or after
/// `max_passes`.
pub(crate) fn fill_spatial(plane: &mut [f64], rows: usize, cols: usize, max_passes: usize) -> (usize, usize) {
    let mut filled = 0;
    let mut passes = 0;
    let mut prev = plane.to_vec();
    while passes < max_passes {
        let mut changed = 0;
        for r in 0..rows {
            for c in 0..cols {
                let i = r * cols + c;
                if prev[i].is_finite() {
                    continue;
                }
                let (sum, n) = neighbours_flat(r, c, rows, cols)
                    .into_iter()
                    .map(|j| prev[j])
                    .filter(|v| v.is_finite())
                    .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if n > 0 {
                    plane[i] = sum / n as f64;
                    changed += 1;
                }
            }
        }
        if changed == 0 {
            break;
        }
        passes += 1;
        filled += changed;
        prev.copy_from_slice(plane);
    }
    (filled, passes)
}
