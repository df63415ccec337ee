//! Parcel state owned by a single advection pass.

use altifit_core::SchemaError;

/// Parcel positions and start times, struct-of-arrays.
///
/// Times are seconds relative to the reference epoch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParcelSet {
    pub(crate) x: Vec<f64>,
    pub(crate) y: Vec<f64>,
    pub(crate) t: Vec<f64>,
}

impl ParcelSet {
    /// Parcels with individual start times.
    ///
    /// # Errors
    ///
    /// [`SchemaError::LengthMismatch`] when the columns differ in length.
    pub fn new(x: Vec<f64>, y: Vec<f64>, t: Vec<f64>) -> Result<Self, SchemaError> {
        for (field, col) in [("y", &y), ("t", &t)] {
            if col.len() != x.len() {
                return Err(SchemaError::LengthMismatch {
                    field: field.to_string(),
                    expected: x.len(),
                    found: col.len(),
                });
            }
        }
        Ok(Self { x, y, t })
    }

    /// Parcels that all start at time `t`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::LengthMismatch`] when `x` and `y` differ in length.
    pub fn at_time(x: Vec<f64>, y: Vec<f64>, t: f64) -> Result<Self, SchemaError> {
        let n = x.len();
        Self::new(x, y, vec![t; n])
    }

    /// Start x.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Start y.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Start times, seconds.
    pub fn t(&self) -> &[f64] {
        &self.t
    }

    /// Number of parcels.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Result of advecting a [`ParcelSet`] to a target time.
///
/// Parcels whose trajectory left velocity coverage have NaN final
/// position, displacement and distance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdvectedParcels {
    /// Start x.
    pub x0: Vec<f64>,
    /// Start y.
    pub y0: Vec<f64>,
    /// Final x.
    pub x: Vec<f64>,
    /// Final y.
    pub y: Vec<f64>,
    /// `x - x0`.
    pub dx: Vec<f64>,
    /// `y - y0`.
    pub dy: Vec<f64>,
    /// Straight-line distance between start and end.
    pub distance: Vec<f64>,
}

impl AdvectedParcels {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            x0: Vec::with_capacity(n),
            y0: Vec::with_capacity(n),
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            dx: Vec::with_capacity(n),
            dy: Vec::with_capacity(n),
            distance: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, origin: (f64, f64), end: Option<(f64, f64)>) {
        let (x1, y1) = end.unwrap_or((f64::NAN, f64::NAN));
        let (dx, dy) = (x1 - origin.0, y1 - origin.1);
        self.x0.push(origin.0);
        self.y0.push(origin.1);
        self.x.push(x1);
        self.y.push(y1);
        self.dx.push(dx);
        self.dy.push(dy);
        self.distance.push(dx.hypot(dy));
    }

    /// Number of parcels.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the result is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Number of parcels that failed to integrate.
    pub fn failures(&self) -> usize {
        self.x
            .iter()
            .zip(&self.y)
            .filter(|(x, y)| !(x.is_finite() && y.is_finite()))
            .count()
    }

    /// Final positions as a new parcel set starting at `t`, for chaining
    /// integration across epochs.
    pub fn continue_from(&self, t: f64) -> ParcelSet {
        ParcelSet {
            x: self.x.clone(),
            y: self.y.clone(),
            t: vec![t; self.x.len()],
        }
    }
}
