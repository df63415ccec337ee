//! Lagrangian run configuration and frame geometry.

use altifit_core::SECONDS_PER_YEAR;
use serde::Deserialize;

use crate::error::LagrangianError;

// ── LagrangianConfig ───────────────────────────────────────────────

/// Settings for a Lagrangian run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LagrangianConfig {
    /// Reference epoch (decimal years) to which observations are advected.
    /// Default: 2000.0.
    pub epoch: f64,
    /// Longest RK4 step, seconds. Default: one twelfth of a year.
    pub max_step_seconds: f64,
    /// Margin around the domain kept when cropping the velocity field and
    /// required to be gap-free. `None` uses one domain width.
    pub buffer: Option<f64>,
    /// Upper bound on spatial gap-filling passes. Default: 100.
    pub max_fill_passes: usize,
}

impl Default for LagrangianConfig {
    fn default() -> Self {
        Self {
            epoch: 2000.0,
            max_step_seconds: SECONDS_PER_YEAR / 12.0,
            buffer: None,
            max_fill_passes: 100,
        }
    }
}

impl LagrangianConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), LagrangianError> {
        if !self.epoch.is_finite() {
            return Err(LagrangianError::Configuration {
                reason: format!("epoch must be finite, got {}", self.epoch),
            });
        }
        if !(self.max_step_seconds.is_finite() && self.max_step_seconds > 0.0) {
            return Err(LagrangianError::Configuration {
                reason: format!(
                    "max_step_seconds must be finite and positive, got {}",
                    self.max_step_seconds
                ),
            });
        }
        if let Some(buffer) = self.buffer {
            if !(buffer.is_finite() && buffer >= 0.0) {
                return Err(LagrangianError::Configuration {
                    reason: format!("buffer must be finite and non-negative, got {buffer}"),
                });
            }
        }
        if self.max_fill_passes == 0 {
            return Err(LagrangianError::Configuration {
                reason: "max_fill_passes must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Buffer to use for a domain of the given width.
    pub fn resolved_buffer(&self, width: f64) -> f64 {
        self.buffer.unwrap_or(width)
    }
}

// ── FrameGeometry ──────────────────────────────────────────────────

/// Domain and output-grid layout shared with the surface fit.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameGeometry {
    /// Domain centre `(x, y)`.
    pub center: (f64, f64),
    /// Side length of the square domain.
    pub width: f64,
    /// First and last output epochs, decimal years.
    pub t_span: (f64, f64),
    /// Spatial spacing of the elevation-change grid.
    pub dz: f64,
    /// Temporal spacing of the elevation-change grid, years.
    pub dt: f64,
}
