//! The assembled, read-only velocity field.

use altifit_core::SECONDS_PER_YEAR;
use altifit_grid::Extent;
use tracing::{debug, info};

use crate::error::VelocityError;
use crate::gap_fill::{fill_spatial, fill_temporal, GapFillReport};
use crate::interp::{locate, sample, InterpolationScheme};
use crate::source::{SamplingDensity, VelocityIngest, VelocityProduct, VelocitySource};

/// Absolute tolerance (map units) when comparing product axes.
const FOOTPRINT_TOLERANCE: f64 = 1e-6;

/// Unit of the field's epoch axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeBase {
    /// Absolute decimal years, as loaded.
    DecimalYears,
    /// Seconds relative to a reference epoch given in decimal years.
    SecondsFrom {
        /// The reference epoch.
        reference: f64,
    },
}

/// A domain box plus the margin kept around it when cropping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropWindow {
    /// The region of interest.
    pub extent: Extent,
    /// Margin added on every side.
    pub buffer: f64,
}

impl CropWindow {
    /// Window around `extent` with the given buffer.
    pub fn new(extent: Extent, buffer: f64) -> Self {
        Self { extent, buffer }
    }

    /// The region plus its buffer.
    pub fn outer(&self) -> Extent {
        self.extent.expand(self.buffer)
    }
}

/// Gridded ice velocity on ascending axes.
///
/// Samples are flat `[epoch][row][col]` arrays in m/yr.
#[derive(Clone, Debug)]
pub struct VelocityField {
    x: Vec<f64>,
    y: Vec<f64>,
    epochs: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
    eu: Option<Vec<f64>>,
    ev: Option<Vec<f64>>,
    time_base: TimeBase,
    scheme: InterpolationScheme,
}

impl VelocityField {
    /// Read, normalize and combine the products of `ingest`.
    ///
    /// With a crop window the field is cut down to the window's outer box
    /// plus one node of margin.
    ///
    /// # Errors
    ///
    /// [`VelocityError::MissingSource`] for an empty ingest,
    /// [`VelocityError::ShapeMismatch`] for malformed arrays,
    /// [`VelocityError::IncompatibleFootprint`] when multi-file products do
    /// not share axes, [`VelocityError::EmptyCrop`] when the window misses
    /// the coverage, and any reader failure.
    pub fn load(ingest: VelocityIngest, window: Option<&CropWindow>) -> Result<Self, VelocityError> {
        let hint = window.map(CropWindow::outer);
        let mut field = match ingest {
            VelocityIngest::SingleGrid(source) => {
                let product = read_normalized(source.as_ref(), hint.as_ref())?;
                let scheme = match product.density {
                    SamplingDensity::Dense => InterpolationScheme::Cubic,
                    SamplingDensity::Sparse => InterpolationScheme::Linear,
                };
                Self::from_normalized(product, scheme)
            }
            VelocityIngest::MultiFile(sources) => {
                if sources.is_empty() {
                    return Err(VelocityError::MissingSource);
                }
                let mut products = Vec::with_capacity(sources.len());
                for source in &sources {
                    let product = read_normalized(source.as_ref(), hint.as_ref())?;
                    if let Some(first) = products.first() {
                        check_footprint(source.name(), first, &product)?;
                    }
                    products.push(product);
                }
                stack_products(products)
            }
        };
        if let Some(outer) = hint {
            field.crop(&outer)?;
        }
        info!(
            scheme = %field.scheme,
            nx = field.x.len(),
            ny = field.y.len(),
            epochs = field.epochs.len(),
            "velocity field loaded"
        );
        Ok(field)
    }

    fn from_normalized(p: VelocityProduct, scheme: InterpolationScheme) -> Self {
        let mut order: Vec<usize> = (0..p.epochs.len()).collect();
        order.sort_by(|a, b| p.epochs[*a].total_cmp(&p.epochs[*b]));
        let plane = p.x.len() * p.y.len();
        let reorder = |arr: &[f64]| -> Vec<f64> {
            order
                .iter()
                .flat_map(|&k| arr[k * plane..(k + 1) * plane].iter().copied())
                .collect()
        };
        Self {
            epochs: order.iter().map(|&k| p.epochs[k]).collect(),
            u: reorder(&p.u),
            v: reorder(&p.v),
            eu: p.eu.as_deref().map(reorder),
            ev: p.ev.as_deref().map(reorder),
            x: p.x,
            y: p.y,
            time_base: TimeBase::DecimalYears,
            scheme,
        }
    }

    /// Column coordinates, ascending.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Row coordinates, ascending.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Epochs, ascending, in the current [`TimeBase`].
    pub fn epochs(&self) -> &[f64] {
        &self.epochs
    }

    /// Unit of [`epochs`](Self::epochs).
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// `(epochs, rows, cols)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.epochs.len(), self.y.len(), self.x.len())
    }

    /// Scheme chosen at load time.
    pub fn preferred_scheme(&self) -> InterpolationScheme {
        self.scheme
    }

    /// Box covered by the sample nodes.
    pub fn extent(&self) -> Extent {
        Extent::new(
            (self.x[0], self.x[self.x.len() - 1]),
            (self.y[0], self.y[self.y.len() - 1]),
        )
    }

    /// Largest finite speed in the field, m/yr.
    pub fn max_speed(&self) -> f64 {
        self.u
            .iter()
            .zip(&self.v)
            .map(|(u, v)| u.hypot(*v))
            .filter(|s| s.is_finite())
            .fold(0.0, f64::max)
    }

    /// Cut the field down to `window` plus one node of margin per side.
    ///
    /// # Errors
    ///
    /// [`VelocityError::EmptyCrop`] if fewer than two nodes remain along
    /// either axis.
    pub fn crop(&mut self, window: &Extent) -> Result<(), VelocityError> {
        let cols = crop_range(&self.x, window.x);
        let rows = crop_range(&self.y, window.y);
        let (Some(cols), Some(rows)) = (cols, rows) else {
            return Err(VelocityError::EmptyCrop { window: *window });
        };
        let (nx, ny) = (self.x.len(), self.y.len());
        if cols == (0..nx) && rows == (0..ny) {
            return Ok(());
        }
        let nt = self.epochs.len();
        let cut = |arr: &[f64]| -> Vec<f64> {
            let mut out = Vec::with_capacity(nt * rows.len() * cols.len());
            for k in 0..nt {
                for r in rows.clone() {
                    let base = (k * ny + r) * nx;
                    out.extend_from_slice(&arr[base + cols.start..base + cols.end]);
                }
            }
            out
        };
        self.u = cut(&self.u);
        self.v = cut(&self.v);
        self.eu = self.eu.as_deref().map(cut);
        self.ev = self.ev.as_deref().map(cut);
        self.x = self.x[cols].to_vec();
        self.y = self.y[rows].to_vec();
        debug!(nx = self.x.len(), ny = self.y.len(), "velocity field cropped");
        Ok(())
    }

    /// Convert epochs to seconds offsets from `reference` (decimal years).
    ///
    /// # Errors
    ///
    /// [`VelocityError::AlreadyNormalized`] on a second call.
    pub fn normalize_epochs(&mut self, reference: f64) -> Result<(), VelocityError> {
        if let TimeBase::SecondsFrom { reference } = self.time_base {
            return Err(VelocityError::AlreadyNormalized { reference });
        }
        for t in &mut self.epochs {
            *t = (*t - reference) * SECONDS_PER_YEAR;
        }
        self.time_base = TimeBase::SecondsFrom { reference };
        Ok(())
    }

    /// Fill undefined velocity samples.
    ///
    /// Uncertainty arrays are filled the same way but never cause a
    /// failure.
    ///
    /// The check covers every node the preferred scheme can read while
    /// interpolating inside `region`: one node beyond it for linear
    /// sampling and two for cubic.
    ///
    /// # Errors
    ///
    /// [`VelocityError::UnfillableGap`] when a `u` or `v` sample read by
    /// interpolation inside `region` (the whole field when `None`) is
    /// still undefined.
    pub fn fill_gaps(
        &mut self,
        region: Option<&Extent>,
        max_passes: usize,
    ) -> Result<GapFillReport, VelocityError> {
        let (ny, nx) = (self.y.len(), self.x.len());
        let mut report = fill_stack(&mut self.u, &self.epochs, ny, nx, max_passes);
        report.absorb(&fill_stack(&mut self.v, &self.epochs, ny, nx, max_passes));
        for arr in [self.eu.as_mut(), self.ev.as_mut()].into_iter().flatten() {
            let err_report = fill_stack(arr, &self.epochs, ny, nx, max_passes);
            debug!(remaining = err_report.remaining, "velocity uncertainty gap fill");
        }
        debug!(
            temporal = report.temporal_filled,
            spatial = report.spatial_filled,
            passes = report.passes,
            remaining = report.remaining,
            "velocity gap fill"
        );

        let region = match region {
            Some(region) => self.stencil_reach(region),
            None => self.extent(),
        };
        let plane = ny * nx;
        let mut cells = 0;
        let mut first = None;
        for (k, &epoch) in self.epochs.iter().enumerate() {
            for r in 0..ny {
                for c in 0..nx {
                    let i = k * plane + r * nx + c;
                    if self.u[i].is_finite() && self.v[i].is_finite() {
                        continue;
                    }
                    if region.contains(self.x[c], self.y[r]) {
                        cells += 1;
                        first.get_or_insert((epoch, (self.x[c], self.y[r])));
                    }
                }
            }
        }
        match first {
            Some((epoch, first)) => Err(VelocityError::UnfillableGap {
                epoch,
                cells,
                first,
            }),
            None => Ok(report),
        }
    }

    /// `region` grown by the nodes the preferred scheme's stencil reaches.
    fn stencil_reach(&self, region: &Extent) -> Extent {
        let nodes = match self.scheme {
            InterpolationScheme::Linear => 1.0,
            InterpolationScheme::Cubic => 2.0,
        };
        let (rx, ry) = (nodes * max_step(&self.x), nodes * max_step(&self.y));
        Extent::new(
            (region.x.0 - rx, region.x.1 + rx),
            (region.y.0 - ry, region.y.1 + ry),
        )
    }

    /// Velocity `(u, v)` in m/yr at `(x, y)` and time `t`.
    ///
    /// Spatial sampling uses `scheme` on the two epochs bracketing `t`,
    /// then blends linearly in time. Times outside the epoch range clamp to
    /// the first or last epoch. Points outside the axes give `(NaN, NaN)`.
    pub fn interpolate(&self, x: f64, y: f64, t: f64, scheme: InterpolationScheme) -> (f64, f64) {
        (
            self.sample_stack(&self.u, x, y, t, scheme),
            self.sample_stack(&self.v, x, y, t, scheme),
        )
    }

    /// Uncertainty `(eu, ev)` at `(x, y, t)`, if the field carries it.
    pub fn interpolate_error(
        &self,
        x: f64,
        y: f64,
        t: f64,
        scheme: InterpolationScheme,
    ) -> Option<(f64, f64)> {
        let (eu, ev) = (self.eu.as_deref()?, self.ev.as_deref()?);
        Some((
            self.sample_stack(eu, x, y, t, scheme),
            self.sample_stack(ev, x, y, t, scheme),
        ))
    }

    fn sample_stack(&self, stack: &[f64], x: f64, y: f64, t: f64, scheme: InterpolationScheme) -> f64 {
        let (Some(cx), Some(cy)) = (locate(&self.x, x), locate(&self.y, y)) else {
            return f64::NAN;
        };
        let Some((k0, k1, w)) = self.bracket(t) else {
            return f64::NAN;
        };
        let (ny, nx) = (self.y.len(), self.x.len());
        let plane = ny * nx;
        let at = |k: usize| sample(&stack[k * plane..(k + 1) * plane], nx, ny, cx, cy, scheme);
        let a = at(k0);
        if w == 0.0 {
            return a;
        }
        a + w * (at(k1) - a)
    }

    fn bracket(&self, t: f64) -> Option<(usize, usize, f64)> {
        if t.is_nan() {
            return None;
        }
        let n = self.epochs.len();
        if n == 1 || t <= self.epochs[0] {
            return Some((0, 0, 0.0));
        }
        if t >= self.epochs[n - 1] {
            return Some((n - 1, n - 1, 0.0));
        }
        let i = self.epochs.partition_point(|e| *e <= t) - 1;
        let w = (t - self.epochs[i]) / (self.epochs[i + 1] - self.epochs[i]);
        Some((i, i + 1, w))
    }
}

fn fill_stack(values: &mut [f64], epochs: &[f64], ny: usize, nx: usize, max_passes: usize) -> GapFillReport {
    let plane = ny * nx;
    let temporal_filled = fill_temporal(values, epochs, plane);
    let mut report = GapFillReport {
        temporal_filled,
        ..GapFillReport::default()
    };
    for slice in values.chunks_mut(plane) {
        let (filled, passes) = fill_spatial(slice, ny, nx, max_passes);
        report.spatial_filled += filled;
        report.passes = report.passes.max(passes);
    }
    report.remaining = values.iter().filter(|v| !v.is_finite()).count();
    report
}

fn max_step(axis: &[f64]) -> f64 {
    axis.windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max)
}

/// Index range of `axis` covering `[lo, hi]` plus one node each side.
fn crop_range(axis: &[f64], (lo, hi): (f64, f64)) -> Option<std::ops::Range<usize>> {
    let n = axis.len();
    let start = axis.partition_point(|a| *a < lo).saturating_sub(1);
    let end = (axis.partition_point(|a| *a <= hi) + 1).min(n);
    (end > start && end - start >= 2).then_some(start..end)
}

fn read_normalized(
    source: &dyn VelocitySource,
    hint: Option<&Extent>,
) -> Result<VelocityProduct, VelocityError> {
    let mut product = source.read(hint)?;
    validate(source.name(), &product)?;
    ascend_axes(source.name(), &mut product)?;
    Ok(product)
}

fn validate(name: &str, p: &VelocityProduct) -> Result<(), VelocityError> {
    for (what, axis) in [("x", &p.x), ("y", &p.y)] {
        if axis.len() < 2 {
            return Err(VelocityError::ShapeMismatch {
                what: format!("{name}: {what} axis"),
                expected: 2,
                found: axis.len(),
            });
        }
    }
    if p.epochs.is_empty() || p.epochs.iter().any(|t| !t.is_finite()) {
        return Err(VelocityError::IncompatibleFootprint {
            name: name.to_string(),
            reason: "epochs must be present and finite".to_string(),
        });
    }
    let expected = p.epochs.len() * p.y.len() * p.x.len();
    let arrays = [
        ("u", Some(&p.u)),
        ("v", Some(&p.v)),
        ("eu", p.eu.as_ref()),
        ("ev", p.ev.as_ref()),
    ];
    for (what, arr) in arrays {
        if let Some(arr) = arr {
            if arr.len() != expected {
                return Err(VelocityError::ShapeMismatch {
                    what: format!("{name}: {what}"),
                    expected,
                    found: arr.len(),
                });
            }
        }
    }
    Ok(())
}

/// Direction of a strictly monotonic axis: `Some(true)` ascending.
fn ascending(axis: &[f64]) -> Option<bool> {
    if axis.windows(2).all(|w| w[1] > w[0]) {
        Some(true)
    } else if axis.windows(2).all(|w| w[1] < w[0]) {
        Some(false)
    } else {
        None
    }
}

fn ascend_axes(name: &str, p: &mut VelocityProduct) -> Result<(), VelocityError> {
    let not_monotonic = |what: &str| VelocityError::IncompatibleFootprint {
        name: name.to_string(),
        reason: format!("{what} axis is not strictly monotonic"),
    };
    let x_up = ascending(&p.x).ok_or_else(|| not_monotonic("x"))?;
    let y_up = ascending(&p.y).ok_or_else(|| not_monotonic("y"))?;
    let (ny, nx) = (p.y.len(), p.x.len());
    let mut arrays: Vec<&mut Vec<f64>> = vec![&mut p.u, &mut p.v];
    arrays.extend(p.eu.as_mut());
    arrays.extend(p.ev.as_mut());
    if !x_up {
        p.x.reverse();
        for arr in arrays.iter_mut() {
            for row in arr.chunks_mut(nx) {
                row.reverse();
            }
        }
    }
    if !y_up {
        p.y.reverse();
        for arr in arrays.iter_mut() {
            for plane in arr.chunks_mut(ny * nx) {
                for r in 0..ny / 2 {
                    let (top, bottom) = plane.split_at_mut((ny - 1 - r) * nx);
                    top[r * nx..(r + 1) * nx].swap_with_slice(&mut bottom[..nx]);
                }
            }
        }
    }
    Ok(())
}

fn check_footprint(name: &str, first: &VelocityProduct, other: &VelocityProduct) -> Result<(), VelocityError> {
    let same = |a: &[f64], b: &[f64]| {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(p, q)| (p - q).abs() <= FOOTPRINT_TOLERANCE)
    };
    if !same(&first.x, &other.x) || !same(&first.y, &other.y) {
        return Err(VelocityError::IncompatibleFootprint {
            name: name.to_string(),
            reason: format!(
                "grid {}x{} does not match the first product's {}x{}",
                other.y.len(),
                other.x.len(),
                first.y.len(),
                first.x.len()
            ),
        });
    }
    Ok(())
}

/// Merge footprint-compatible products into one linearly sampled field.
fn stack_products(products: Vec<VelocityProduct>) -> VelocityField {
    let with_errors = products.iter().all(|p| p.eu.is_some() && p.ev.is_some());
    let mut merged = VelocityProduct {
        x: products[0].x.clone(),
        y: products[0].y.clone(),
        epochs: Vec::new(),
        u: Vec::new(),
        v: Vec::new(),
        eu: with_errors.then(Vec::new),
        ev: with_errors.then(Vec::new),
        density: SamplingDensity::Sparse,
    };
    for p in products {
        merged.epochs.extend(p.epochs);
        merged.u.extend(p.u);
        merged.v.extend(p.v);
        if let (Some(dst), Some(src)) = (merged.eu.as_mut(), p.eu) {
            dst.extend(src);
        }
        if let (Some(dst), Some(src)) = (merged.ev.as_mut(), p.ev) {
            dst.extend(src);
        }
    }
    VelocityField::from_normalized(merged, InterpolationScheme::Linear)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAN: f64 = f64::NAN;

    struct Fixed(&'static str, VelocityProduct);

    impl VelocitySource for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn read(&self, _window: Option<&Extent>) -> Result<VelocityProduct, VelocityError> {
            Ok(self.1.clone())
        }
    }

    fn product(x: Vec<f64>, y: Vec<f64>, epochs: Vec<f64>, f: impl Fn(f64, f64, f64) -> (f64, f64)) -> VelocityProduct {
        let mut u = Vec::new();
        let mut v = Vec::new();
        for &t in &epochs {
            for &yy in &y {
                for &xx in &x {
                    let (a, b) = f(xx, yy, t);
                    u.push(a);
                    v.push(b);
                }
            }
        }
        VelocityProduct {
            x,
            y,
            epochs,
            u,
            v,
            eu: None,
            ev: None,
            density: SamplingDensity::Dense,
        }
    }

    fn axis(lo: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| lo + i as f64 * step).collect()
    }

    fn single(p: VelocityProduct) -> VelocityIngest {
        VelocityIngest::SingleGrid(Box::new(Fixed("single", p)))
    }

    #[test]
    fn dense_single_grid_prefers_cubic() {
        let p = product(axis(0.0, 100.0, 5), axis(0.0, 100.0, 5), vec![2015.0], |_, _, _| (1.0, 2.0));
        let field = VelocityField::load(single(p.clone()), None).unwrap();
        assert_eq!(field.preferred_scheme(), InterpolationScheme::Cubic);

        let mut sparse = p;
        sparse.density = SamplingDensity::Sparse;
        let field = VelocityField::load(single(sparse), None).unwrap();
        assert_eq!(field.preferred_scheme(), InterpolationScheme::Linear);
    }

    #[test]
    fn multi_file_is_linear_and_sorted() {
        let a = product(axis(0.0, 10.0, 3), axis(0.0, 10.0, 3), vec![2018.0], |_, _, _| (18.0, 0.0));
        let b = product(axis(0.0, 10.0, 3), axis(0.0, 10.0, 3), vec![2016.0], |_, _, _| (16.0, 0.0));
        let ingest = VelocityIngest::MultiFile(vec![Box::new(Fixed("a", a)), Box::new(Fixed("b", b))]);
        let field = VelocityField::load(ingest, None).unwrap();
        assert_eq!(field.preferred_scheme(), InterpolationScheme::Linear);
        assert_eq!(field.epochs(), &[2016.0, 2018.0]);
        let (u, _) = field.interpolate(5.0, 5.0, 2017.0, InterpolationScheme::Linear);
        assert!((u - 17.0).abs() < 1e-12);
    }

    #[test]
    fn multi_file_rejects_mismatched_footprint() {
        let a = product(axis(0.0, 10.0, 3), axis(0.0, 10.0, 3), vec![2018.0], |_, _, _| (1.0, 0.0));
        let b = product(axis(5.0, 10.0, 3), axis(0.0, 10.0, 3), vec![2016.0], |_, _, _| (1.0, 0.0));
        let ingest = VelocityIngest::MultiFile(vec![Box::new(Fixed("a", a)), Box::new(Fixed("b", b))]);
        assert!(matches!(
            VelocityField::load(ingest, None),
            Err(VelocityError::IncompatibleFootprint { .. })
        ));
        assert!(matches!(
            VelocityField::load(VelocityIngest::MultiFile(Vec::new()), None),
            Err(VelocityError::MissingSource)
        ));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut p = product(axis(0.0, 1.0, 3), axis(0.0, 1.0, 3), vec![2015.0], |_, _, _| (0.0, 0.0));
        p.v.pop();
        assert!(matches!(
            VelocityField::load(single(p), None),
            Err(VelocityError::ShapeMismatch { expected: 9, found: 8, .. })
        ));
    }

    #[test]
    fn descending_axes_are_flipped() {
        // u = x, v = y on descending axes.
        let p = product(axis(40.0, -10.0, 5), axis(20.0, -10.0, 3), vec![2015.0], |x, y, _| (x, y));
        let field = VelocityField::load(single(p), None).unwrap();
        assert_eq!(field.x(), &[0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(field.y(), &[0.0, 10.0, 20.0]);
        let (u, v) = field.interpolate(15.0, 5.0, 2015.0, InterpolationScheme::Linear);
        assert!((u - 15.0).abs() < 1e-12);
        assert!((v - 5.0).abs() < 1e-12);
    }

    #[test]
    fn outside_axes_is_nan_and_time_clamps() {
        let p = product(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4), vec![2010.0, 2020.0], |_, _, t| (t - 2000.0, 0.0));
        let field = VelocityField::load(single(p), None).unwrap();
        let (u, v) = field.interpolate(3.5, 1.0, 2015.0, InterpolationScheme::Linear);
        assert!(u.is_nan() && v.is_nan());
        let (u, _) = field.interpolate(1.0, 1.0, 1990.0, InterpolationScheme::Linear);
        assert_eq!(u, 10.0);
        let (u, _) = field.interpolate(1.0, 1.0, 2050.0, InterpolationScheme::Cubic);
        assert!((u - 20.0).abs() < 1e-12);
        let (u, _) = field.interpolate(1.0, 1.0, 2015.0, InterpolationScheme::Linear);
        assert!((u - 15.0).abs() < 1e-12);
    }

    #[test]
    fn crop_keeps_one_node_margin() {
        let p = product(axis(0.0, 100.0, 11), axis(0.0, 100.0, 11), vec![2015.0], |_, _, _| (1.0, 1.0));
        let window = CropWindow::new(Extent::new((350.0, 550.0), (400.0, 600.0)), 0.0);
        let field = VelocityField::load(single(p.clone()), Some(&window)).unwrap();
        assert_eq!(field.x(), &[300.0, 400.0, 500.0, 600.0]);
        assert_eq!(field.y(), &[300.0, 400.0, 500.0, 600.0, 700.0]);

        let far = CropWindow::new(Extent::new((5000.0, 6000.0), (0.0, 100.0)), 10.0);
        assert!(matches!(
            VelocityField::load(single(p), Some(&far)),
            Err(VelocityError::EmptyCrop { .. })
        ));
    }

    #[test]
    fn normalize_twice_is_an_error() {
        let p = product(axis(0.0, 1.0, 2), axis(0.0, 1.0, 2), vec![2001.0, 2002.0], |_, _, _| (0.0, 0.0));
        let mut field = VelocityField::load(single(p), None).unwrap();
        field.normalize_epochs(2001.0).unwrap();
        assert_eq!(field.epochs()[0], 0.0);
        assert_eq!(field.epochs()[1], SECONDS_PER_YEAR);
        assert_eq!(field.time_base(), TimeBase::SecondsFrom { reference: 2001.0 });
        assert!(matches!(
            field.normalize_epochs(2001.0),
            Err(VelocityError::AlreadyNormalized { reference }) if reference == 2001.0
        ));
    }

    #[test]
    fn gaps_inside_region_are_filled() {
        let mut p = product(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4), vec![2015.0], |_, _, _| (3.0, -1.0));
        p.u[5] = NAN;
        p.v[5] = NAN;
        p.u[10] = NAN;
        let mut field = VelocityField::load(single(p), None).unwrap();
        let report = field.fill_gaps(None, 20).unwrap();
        assert_eq!(report.spatial_filled, 3);
        assert_eq!(report.remaining, 0);
        let (u, v) = field.interpolate(1.5, 1.5, 2015.0, InterpolationScheme::Linear);
        assert!((u - 3.0).abs() < 1e-12);
        assert!((v + 1.0).abs() < 1e-12);
    }

    #[test]
    fn unfillable_gap_inside_region_is_fatal() {
        let mut p = product(axis(0.0, 1.0, 5), axis(0.0, 1.0, 5), vec![2015.0], |_, _, _| (1.0, 1.0));
        p.u = vec![NAN; 25];
        p.density = SamplingDensity::Sparse;
        let mut field = VelocityField::load(single(p), None).unwrap();
        let err = field
            .fill_gaps(Some(&Extent::new((2.0, 2.0), (2.0, 2.0))), 10)
            .unwrap_err();
        let VelocityError::UnfillableGap { epoch, cells, first } = err else {
            panic!("expected UnfillableGap, got {err:?}");
        };
        // Linear sampling at (2, 2) can read every node within one spacing.
        assert_eq!(epoch, 2015.0);
        assert_eq!(cells, 9);
        assert_eq!(first, (1.0, 1.0));
    }

    #[test]
    fn cubic_gap_check_covers_the_stencil() {
        // One hole at (4, 2), two nodes right of the region's edge.
        let mut p = product(axis(0.0, 1.0, 5), axis(0.0, 1.0, 5), vec![2015.0], |_, _, _| (1.0, 1.0));
        p.u[2 * 5 + 4] = NAN;
        let region = Extent::new((1.0, 2.0), (1.0, 3.0));

        let mut cubic = VelocityField::load(single(p.clone()), None).unwrap();
        let (u, _) = cubic.interpolate(2.0, 2.0, 2015.0, InterpolationScheme::Cubic);
        assert!(u.is_nan());
        let err = cubic.fill_gaps(Some(&region), 0).unwrap_err();
        assert!(matches!(
            err,
            VelocityError::UnfillableGap { cells: 1, first, .. } if first == (4.0, 2.0)
        ));

        p.density = SamplingDensity::Sparse;
        let mut linear = VelocityField::load(single(p), None).unwrap();
        let report = linear.fill_gaps(Some(&region), 0).unwrap();
        assert_eq!(report.remaining, 1);
        let (u, _) = linear.interpolate(2.0, 2.0, 2015.0, InterpolationScheme::Linear);
        assert_eq!(u, 1.0);
    }

    #[test]
    fn gaps_outside_region_are_tolerated() {
        let mut p = product(axis(0.0, 1.0, 3), axis(0.0, 1.0, 3), vec![2015.0, 2016.0], |_, _, _| (1.0, 1.0));
        // Second epoch entirely undefined; no finite neighbours in time
        // after it or in space within that epoch.
        for i in 9..18 {
            p.u[i] = NAN;
        }
        let mut field = VelocityField::load(single(p), None).unwrap();
        let report = field
            .fill_gaps(Some(&Extent::new((10.0, 11.0), (10.0, 11.0))), 10)
            .unwrap();
        assert_eq!(report.remaining, 9);
    }

    #[test]
    fn error_arrays_follow_crop_normalization_and_gap_fill() {
        // eu = x / 100, ev = 2 at the first epoch and 4 at the second.
        let mut p = product(axis(0.0, 100.0, 11), axis(0.0, 100.0, 11), vec![2010.0, 2020.0], |_, _, _| (5.0, 0.0));
        let mut eu = Vec::new();
        let mut ev = Vec::new();
        for k in 0..2 {
            for _ in 0..11 {
                for c in 0..11 {
                    eu.push(c as f64);
                    ev.push(2.0 * (k + 1) as f64);
                }
            }
        }
        // A hole in both epochs, filled from its spatial neighbours.
        eu[5 * 11 + 5] = NAN;
        eu[121 + 5 * 11 + 5] = NAN;
        p.eu = Some(eu);
        p.ev = Some(ev);
        p.density = SamplingDensity::Sparse;

        let window = CropWindow::new(Extent::new((350.0, 650.0), (350.0, 650.0)), 0.0);
        let mut field = VelocityField::load(single(p), Some(&window)).unwrap();
        assert_eq!(field.x(), &[300.0, 400.0, 500.0, 600.0, 700.0]);
        field.normalize_epochs(2010.0).unwrap();
        field.fill_gaps(Some(&window.outer()), 10).unwrap();

        let half = 5.0 * SECONDS_PER_YEAR;
        let (eu, ev) = field
            .interpolate_error(500.0, 500.0, half, InterpolationScheme::Linear)
            .unwrap();
        assert!((eu - 5.0).abs() < 1e-12);
        assert!((ev - 3.0).abs() < 1e-12);
        let (eu, ev) = field
            .interpolate_error(350.0, 400.0, 0.0, InterpolationScheme::Linear)
            .unwrap();
        assert!((eu - 3.5).abs() < 1e-12);
        assert!((ev - 2.0).abs() < 1e-12);
        // Outside the cropped axes.
        let (eu, _) = field
            .interpolate_error(100.0, 500.0, half, InterpolationScheme::Linear)
            .unwrap();
        assert!(eu.is_nan());
    }

    #[test]
    fn interpolate_error_is_none_without_error_arrays() {
        let p = product(axis(0.0, 1.0, 3), axis(0.0, 1.0, 3), vec![2015.0], |_, _, _| (1.0, 1.0));
        let field = VelocityField::load(single(p), None).unwrap();
        assert_eq!(
            field.interpolate_error(1.0, 1.0, 2015.0, InterpolationScheme::Linear),
            None
        );
    }

    #[test]
    fn max_speed_ignores_nan() {
        let mut p = product(axis(0.0, 1.0, 2), axis(0.0, 1.0, 2), vec![2015.0], |_, _, _| (3.0, 4.0));
        p.u[0] = NAN;
        let field = VelocityField::load(single(p), None).unwrap();
        assert_eq!(field.max_speed(), 5.0);
    }
}
