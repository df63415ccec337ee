//! Fourth-order Runge-Kutta parcel integration.

use altifit_core::SECONDS_PER_YEAR;
use altifit_velocity::{InterpolationScheme, VelocityField};

use crate::error::LagrangianError;
use crate::parcel::{AdvectedParcels, ParcelSet};

/// Integrates parcel trajectories through a [`VelocityField`].
///
/// The field's epochs must be seconds offsets (see
/// [`VelocityField::normalize_epochs`]); parcel and target times use the
/// same base. Each parcel integrates its own interval in equal steps no
/// longer than `max_step_seconds`, forward or backward in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParcelIntegrator {
    scheme: InterpolationScheme,
    max_step_seconds: f64,
}

impl ParcelIntegrator {
    /// Integrator sampling velocity with `scheme`.
    ///
    /// # Errors
    ///
    /// [`LagrangianError::Configuration`] unless `max_step_seconds` is
    /// finite and positive.
    pub fn new(scheme: InterpolationScheme, max_step_seconds: f64) -> Result<Self, LagrangianError> {
        if !(max_step_seconds.is_finite() && max_step_seconds > 0.0) {
            return Err(LagrangianError::Configuration {
                reason: format!("max_step_seconds must be finite and positive, got {max_step_seconds}"),
            });
        }
        Ok(Self {
            scheme,
            max_step_seconds,
        })
    }

    /// Spatial interpolation scheme in use.
    pub fn scheme(&self) -> InterpolationScheme {
        self.scheme
    }

    /// Longest step, seconds.
    pub fn max_step_seconds(&self) -> f64 {
        self.max_step_seconds
    }

    /// Advect every parcel from its own start time to `target_time`.
    pub fn advect(&self, parcels: &ParcelSet, field: &VelocityField, target_time: f64) -> AdvectedParcels {
        let mut out = AdvectedParcels::with_capacity(parcels.len());
        for ((&x, &y), &t) in parcels.x().iter().zip(parcels.y()).zip(parcels.t()) {
            out.push((x, y), self.integrate(field, (x, y), t, target_time));
        }
        out
    }

    /// Trajectory end point, or `None` if velocity became undefined.
    fn integrate(&self, field: &VelocityField, start: (f64, f64), t0: f64, t1: f64) -> Option<(f64, f64)> {
        if !(start.0.is_finite() && start.1.is_finite() && t0.is_finite() && t1.is_finite()) {
            return None;
        }
        let span = t1 - t0;
        if span == 0.0 {
            return Some(start);
        }
        let steps = (span.abs() / self.max_step_seconds).ceil().max(1.0) as usize;
        let h = span / steps as f64;
        let velocity = |x: f64, y: f64, t: f64| -> Option<(f64, f64)> {
            let (u, v) = field.interpolate(x, y, t, self.scheme);
            (u.is_finite() && v.is_finite()).then_some((u / SECONDS_PER_YEAR, v / SECONDS_PER_YEAR))
        };
        let (mut x, mut y) = start;
        for i in 0..steps {
            let t = t0 + i as f64 * h;
            let k1 = velocity(x, y, t)?;
            let k2 = velocity(x + 0.5 * h * k1.0, y + 0.5 * h * k1.1, t + 0.5 * h)?;
            let k3 = velocity(x + 0.5 * h * k2.0, y + 0.5 * h * k2.1, t + 0.5 * h)?;
            let k4 = velocity(x + h * k3.0, y + h * k3.1, t + h)?;
            x += h / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0);
            y += h / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1);
        }
        Some((x, y))
    }
}
