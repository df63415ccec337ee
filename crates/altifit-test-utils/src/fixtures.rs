//! Velocity sources with analytic fields.

use altifit_grid::{Extent, Grid};
use altifit_velocity::{
    SamplingDensity, VelocityError, VelocityField, VelocityIngest, VelocityProduct, VelocitySource,
};

fn axis(lo: f64, hi: f64, spacing: f64) -> Vec<f64> {
    match Grid::new("axis", (lo, hi), spacing) {
        Ok(g) => g.ctrs().to_vec(),
        Err(e) => panic!("fixture axis: {e}"),
    }
}

/// Uniform velocity over a box.
#[derive(Clone, Debug)]
pub struct ConstantVelocity {
    pub name: String,
    pub u: f64,
    pub v: f64,
    pub extent: Extent,
    pub spacing: f64,
    pub epochs: Vec<f64>,
    pub density: SamplingDensity,
}

impl ConstantVelocity {
    /// Dense product with epochs 1990 and 2030.
    pub fn new(u: f64, v: f64, extent: Extent, spacing: f64) -> Self {
        Self {
            name: "constant".to_string(),
            u,
            v,
            extent,
            spacing,
            epochs: vec![1990.0, 2030.0],
            density: SamplingDensity::Dense,
        }
    }

    pub fn with_density(mut self, density: SamplingDensity) -> Self {
        self.density = density;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn ingest(self) -> VelocityIngest {
        VelocityIngest::SingleGrid(Box::new(self))
    }
}

impl VelocitySource for ConstantVelocity {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, _window: Option<&Extent>) -> Result<VelocityProduct, VelocityError> {
        let x = axis(self.extent.x.0, self.extent.x.1, self.spacing);
        let y = axis(self.extent.y.0, self.extent.y.1, self.spacing);
        let n = x.len() * y.len() * self.epochs.len();
        Ok(VelocityProduct {
            x,
            y,
            epochs: self.epochs.clone(),
            u: vec![self.u; n],
            v: vec![self.v; n],
            eu: Some(vec![1.0; n]),
            ev: Some(vec![1.0; n]),
            density: self.density,
        })
    }
}

type VelocityFn = dyn Fn(f64, f64, f64) -> (f64, f64) + Send + Sync;

/// Product sampled from a closure `(x, y, epoch) -> (u, v)`.
pub struct SyntheticVelocity {
    pub name: String,
    pub extent: Extent,
    pub spacing: f64,
    pub epochs: Vec<f64>,
    pub density: SamplingDensity,
    /// Emit axes in descending order, as some archives do.
    pub descending: bool,
    f: Box<VelocityFn>,
}

impl SyntheticVelocity {
    pub fn new(
        extent: Extent,
        spacing: f64,
        epochs: Vec<f64>,
        f: impl Fn(f64, f64, f64) -> (f64, f64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: "synthetic".to_string(),
            extent,
            spacing,
            epochs,
            density: SamplingDensity::Sparse,
            descending: false,
            f: Box::new(f),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

impl VelocitySource for SyntheticVelocity {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, _window: Option<&Extent>) -> Result<VelocityProduct, VelocityError> {
        let mut x = axis(self.extent.x.0, self.extent.x.1, self.spacing);
        let mut y = axis(self.extent.y.0, self.extent.y.1, self.spacing);
        if self.descending {
            x.reverse();
            y.reverse();
        }
        let mut u = Vec::with_capacity(x.len() * y.len() * self.epochs.len());
        let mut v = Vec::with_capacity(u.capacity());
        for &t in &self.epochs {
            for &yy in &y {
                for &xx in &x {
                    let (a, b) = (self.f)(xx, yy, t);
                    u.push(a);
                    v.push(b);
                }
            }
        }
        Ok(VelocityProduct {
            x,
            y,
            epochs: self.epochs.clone(),
            u,
            v,
            eu: None,
            ev: None,
            density: self.density,
        })
    }
}

/// Source whose reader always fails.
pub struct FailingVelocity;

impl VelocitySource for FailingVelocity {
    fn name(&self) -> &str {
        "failing"
    }

    fn read(&self, _window: Option<&Extent>) -> Result<VelocityProduct, VelocityError> {
        Err(VelocityError::Source {
            name: "failing".to_string(),
            reason: "simulated read failure".to_string(),
        })
    }
}

/// Constant field over `extent`, loaded and normalized to `reference`.
pub fn constant_field(u: f64, v: f64, extent: Extent, spacing: f64, reference: f64) -> VelocityField {
    let mut field = match VelocityField::load(ConstantVelocity::new(u, v, extent, spacing).ingest(), None) {
        Ok(f) => f,
        Err(e) => panic!("constant field: {e}"),
    };
    if let Err(e) = field.normalize_epochs(reference) {
        panic!("constant field: {e}");
    }
    field
}
