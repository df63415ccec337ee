//! Fit configuration, validation, and error types.
//!
//! [`FitConfig`] is the single immutable value threaded through a run. It
//! deserializes from JSON so the orchestration layer can keep run settings
//! in files; every section has defaults matching long-standing production
//! values, and [`validate()`](FitConfig::validate) checks ranges at startup.

use std::error::Error;
use std::fmt;

use altifit_advect::{FrameGeometry, LagrangianConfig, LagrangianError};
use altifit_core::{SensorId, SECONDS_PER_YEAR};
use altifit_grid::Extent;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::collaborators::KnownBadEpoch;

// ── Spacing ────────────────────────────────────────────────────────

/// Grid spacings of the fit.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Spacing {
    /// Reference-surface grid spacing, m. Default: 250.
    pub z0: f64,
    /// Elevation-change grid spacing, m. Default: 500.
    pub dz: f64,
    /// Elevation-change epoch spacing, years. Default: 0.5.
    pub dt: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            z0: 250.0,
            dz: 500.0,
            dt: 0.5,
        }
    }
}

// ── SensorErrorConfig ──────────────────────────────────────────────

/// Sensor classes and bucket widths for correlated-error inflation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorErrorConfig {
    /// Satellite altimeters. Default: `[1, 2]`.
    pub orbital_sensors: Vec<u32>,
    /// Airborne altimeters. Default: `[3, 4, 5]`.
    pub airborne_sensors: Vec<u32>,
    /// Orbital bucket width, seconds. Default: 10.
    pub orbital_window_seconds: f64,
    /// Airborne bucket width, seconds. Default: 600.
    pub airborne_window_seconds: f64,
    /// Multiplier on the bucket-mean slope. Default: 5.
    pub slope_sigma_scale: f64,
}

impl Default for SensorErrorConfig {
    fn default() -> Self {
        Self {
            orbital_sensors: vec![1, 2],
            airborne_sensors: vec![3, 4, 5],
            orbital_window_seconds: 10.0,
            airborne_window_seconds: 600.0,
            slope_sigma_scale: 5.0,
        }
    }
}

impl SensorErrorConfig {
    /// Bucket width in decimal years for `sensor`, `None` if unclassified.
    pub fn window_years(&self, sensor: SensorId) -> Option<f64> {
        if self.orbital_sensors.contains(&sensor.0) {
            Some(self.orbital_window_seconds / SECONDS_PER_YEAR)
        } else if self.airborne_sensors.contains(&sensor.0) {
            Some(self.airborne_window_seconds / SECONDS_PER_YEAR)
        } else {
            None
        }
    }

    /// Largest classified sensor code.
    pub fn max_classified(&self) -> Option<u32> {
        self.orbital_sensors
            .iter()
            .chain(&self.airborne_sensors)
            .copied()
            .max()
    }
}

// ── FusionConfig ───────────────────────────────────────────────────

/// How firn-air-content corrections are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirnMode {
    /// No firn correction.
    #[default]
    Off,
    /// Subtract the modelled firn height from `z`.
    Fixed,
    /// Carry the firn height as a column and let the fit solve for a scale
    /// factor on it.
    Rescale,
}

/// Masking and correction settings for observation assembly.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Minimum height above the geoid; lower points are treated as water.
    /// `None` keeps everything.
    pub water_mask_threshold: Option<f64>,
    /// Extra uncertainty added in quadrature to older observations.
    pub extra_error: Option<f64>,
    /// Observations before this decimal year get `extra_error`.
    /// Default: 2010.
    pub extra_error_before: f64,
    /// Firn handling. Default: off.
    pub firn_mode: FirnMode,
    /// Known-bad acquisition epochs to drop. Default: the ICESat
    /// 2003.7821 campaign.
    pub known_bad_epochs: Vec<KnownBadEpoch>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            water_mask_threshold: None,
            extra_error: None,
            extra_error_before: 2010.0,
            firn_mode: FirnMode::Off,
            known_bad_epochs: vec![KnownBadEpoch::default()],
        }
    }
}

// ── GridBiasParams ─────────────────────────────────────────────────

/// Shape and prior of the bias grid solved for each DEM sensor.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridBiasParams {
    /// Node spacing of the bias grid, m. Default: 10 km.
    pub spacing: f64,
    /// Expected RMS of the bias, m. Default: 1.
    pub expected_rms: f64,
    /// Expected RMS of the bias gradient, m/m. Default: 1e-4.
    pub expected_rms_grad: f64,
}

impl Default for GridBiasParams {
    fn default() -> Self {
        Self {
            spacing: 10_000.0,
            expected_rms: 1.0,
            expected_rms_grad: 1.0e-4,
        }
    }
}

impl GridBiasParams {
    /// Parse `key=value` lines over the defaults.
    ///
    /// Lines starting with `#` are comments, and anything after a `#` in
    /// a value is ignored. Lines that do not parse and unknown keys are
    /// logged and skipped.
    pub fn from_key_values(text: &str) -> Self {
        let mut params = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed = line.split_once('=').and_then(|(key, value)| {
                let value = value.split('#').next().unwrap_or_default().trim();
                value.parse::<f64>().ok().map(|v| (key.trim(), v))
            });
            let Some((key, value)) = parsed else {
                warn!(line, "skipping grid bias parameter line");
                continue;
            };
            match key {
                "spacing" => params.spacing = value,
                "expected_rms" => params.expected_rms = value,
                "expected_rms_grad" => params.expected_rms_grad = value,
                _ => warn!(key, "unknown grid bias parameter"),
            }
        }
        params
    }
}

// ── SolverConfig ───────────────────────────────────────────────────

/// Parameters forwarded verbatim to the fit engine.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Overrides merged over the default expected-RMS constraints.
    pub e_rms: IndexMap<String, f64>,
    /// Columns defining per-segment biases.
    pub bias_params: Vec<String>,
    /// Lags (in epochs) of the rate grids to report.
    pub dzdt_lags: Vec<u32>,
    /// Iterations of outlier editing.
    pub max_iterations: u32,
    /// Expected RMS of DEM slope biases.
    pub e_slope_bias: f64,
    /// Observations whose estimated bias exceeds this many expected RMS
    /// values are edited out. `None` disables bias editing. Default: 6.
    pub bias_nsigma_edit: Option<f64>,
    /// Iteration after which bias editing starts. Default: 6.
    pub bias_nsigma_iteration: u32,
    /// Bias grid solved for every DEM sensor. `None` solves none.
    pub dem_grid_bias: Option<GridBiasParams>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            e_rms: IndexMap::new(),
            bias_params: ["time_corr", "sensor", "spot"]
                .into_iter()
                .map(String::from)
                .collect(),
            dzdt_lags: vec![1, 4],
            max_iterations: 5,
            e_slope_bias: 1.0e-5,
            bias_nsigma_edit: Some(6.0),
            bias_nsigma_iteration: 6,
            dem_grid_bias: None,
        }
    }
}

impl SolverConfig {
    /// Expected-RMS constraints: defaults with [`e_rms`](Self::e_rms)
    /// applied on top.
    pub fn resolved_e_rms(&self) -> IndexMap<String, f64> {
        let mut out: IndexMap<String, f64> = [
            ("d2z0_dx2", 200_000.0 / 3000.0 / 3000.0),
            ("d3z_dx2dt", 3000.0 / 3000.0 / 3000.0),
            ("d2z_dxdt", 3000.0 / 3000.0),
            ("d2z_dt2", 5000.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (k, v) in &self.e_rms {
            out.insert(k.clone(), *v);
        }
        out
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`FitConfig::validate()`] or parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Centre or width unusable.
    InvalidDomain {
        /// Description of the problem.
        reason: String,
    },
    /// A spacing is not finite and positive.
    InvalidSpacing {
        /// Which spacing.
        name: &'static str,
        /// The value.
        value: f64,
    },
    /// `t_span` is empty or non-finite.
    InvalidTimeSpan {
        /// Start.
        lo: f64,
        /// End.
        hi: f64,
    },
    /// Sensor error settings are inconsistent.
    InvalidSensorError {
        /// Description of the problem.
        reason: String,
    },
    /// Fusion settings are out of range.
    InvalidFusion {
        /// Description of the problem.
        reason: String,
    },
    /// Solver settings are out of range.
    InvalidSolver {
        /// Description of the problem.
        reason: String,
    },
    /// The Lagrangian section did not validate.
    Lagrangian(LagrangianError),
    /// The configuration text could not be parsed.
    Parse {
        /// Parser message.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { reason } => write!(f, "invalid domain: {reason}"),
            Self::InvalidSpacing { name, value } => {
                write!(f, "spacing.{name} must be finite and positive, got {value}")
            }
            Self::InvalidTimeSpan { lo, hi } => write!(f, "t_span [{lo}, {hi}] is empty"),
            Self::InvalidSensorError { reason } => {
                write!(f, "invalid sensor error config: {reason}")
            }
            Self::InvalidFusion { reason } => write!(f, "invalid fusion config: {reason}"),
            Self::InvalidSolver { reason } => write!(f, "invalid solver config: {reason}"),
            Self::Lagrangian(e) => write!(f, "lagrangian: {e}"),
            Self::Parse { reason } => write!(f, "cannot parse config: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lagrangian(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LagrangianError> for ConfigError {
    fn from(e: LagrangianError) -> Self {
        Self::Lagrangian(e)
    }
}

// ── FitConfig ──────────────────────────────────────────────────────

fn default_width() -> f64 {
    40_000.0
}

fn default_t_span() -> (f64, f64) {
    (2003.0, 2020.0)
}

/// Complete configuration of one fit tile.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FitConfig {
    /// Tile centre `(x, y)`, m.
    pub center: (f64, f64),
    /// Tile side length, m. Default: 40 km.
    #[serde(default = "default_width")]
    pub width: f64,
    /// First and last output epochs. Default: 2003 to 2020.
    #[serde(default = "default_t_span")]
    pub t_span: (f64, f64),
    /// Grid spacings.
    #[serde(default)]
    pub spacing: Spacing,
    /// Index of the reference epoch in the output time axis. `None` uses
    /// the count of `dt` steps in `t_span`.
    #[serde(default)]
    pub reference_epoch: Option<usize>,
    /// Correlated-error model.
    #[serde(default)]
    pub sensor_error: SensorErrorConfig,
    /// Masking and corrections.
    #[serde(default)]
    pub fusion: FusionConfig,
    /// Fit engine parameters.
    #[serde(default)]
    pub solver: SolverConfig,
    /// Lagrangian settings, used when a velocity ingest is supplied.
    #[serde(default)]
    pub lagrangian: Option<LagrangianConfig>,
}

impl FitConfig {
    /// Defaults around `center`.
    pub fn new(center: (f64, f64)) -> Self {
        Self {
            center,
            width: default_width(),
            t_span: default_t_span(),
            spacing: Spacing::default(),
            reference_epoch: None,
            sensor_error: SensorErrorConfig::default(),
            fusion: FusionConfig::default(),
            solver: SolverConfig::default(),
            lagrangian: None,
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Square tile `center ± width / 2`.
    pub fn domain(&self) -> Extent {
        Extent::centered(self.center, self.width)
    }

    /// Layout of the elevation-change grid for the Lagrangian frame.
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            center: self.center,
            width: self.width,
            t_span: self.t_span,
            dz: self.spacing.dz,
            dt: self.spacing.dt,
        }
    }

    /// Validate all ranges and cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Domain.
        if !(self.center.0.is_finite() && self.center.1.is_finite()) {
            return Err(ConfigError::InvalidDomain {
                reason: format!("center {:?} is not finite", self.center),
            });
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(ConfigError::InvalidDomain {
                reason: format!("width must be finite and positive, got {}", self.width),
            });
        }
        // 2. Time span.
        let (lo, hi) = self.t_span;
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(ConfigError::InvalidTimeSpan { lo, hi });
        }
        // 3. Spacings.
        for (name, value) in [
            ("z0", self.spacing.z0),
            ("dz", self.spacing.dz),
            ("dt", self.spacing.dt),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSpacing { name, value });
            }
        }
        // 4. Sensor error model.
        let se = &self.sensor_error;
        for (name, w) in [
            ("orbital_window_seconds", se.orbital_window_seconds),
            ("airborne_window_seconds", se.airborne_window_seconds),
        ] {
            if !(w.is_finite() && w > 0.0) {
                return Err(ConfigError::InvalidSensorError {
                    reason: format!("{name} must be finite and positive, got {w}"),
                });
            }
        }
        if !(se.slope_sigma_scale.is_finite() && se.slope_sigma_scale >= 0.0) {
            return Err(ConfigError::InvalidSensorError {
                reason: format!(
                    "slope_sigma_scale must be finite and non-negative, got {}",
                    se.slope_sigma_scale
                ),
            });
        }
        if let Some(id) = se
            .orbital_sensors
            .iter()
            .find(|id| se.airborne_sensors.contains(id))
        {
            return Err(ConfigError::InvalidSensorError {
                reason: format!("sensor {id} is both orbital and airborne"),
            });
        }
        // 5. Fusion.
        let fu = &self.fusion;
        if let Some(t) = fu.water_mask_threshold {
            if !t.is_finite() {
                return Err(ConfigError::InvalidFusion {
                    reason: format!("water_mask_threshold must be finite, got {t}"),
                });
            }
        }
        if let Some(e) = fu.extra_error {
            if !(e.is_finite() && e >= 0.0) {
                return Err(ConfigError::InvalidFusion {
                    reason: format!("extra_error must be finite and non-negative, got {e}"),
                });
            }
        }
        if !fu.extra_error_before.is_finite() {
            return Err(ConfigError::InvalidFusion {
                reason: "extra_error_before must be finite".to_string(),
            });
        }
        // 6. Solver.
        let so = &self.solver;
        if let Some(n) = so.bias_nsigma_edit {
            if !(n.is_finite() && n > 0.0) {
                return Err(ConfigError::InvalidSolver {
                    reason: format!("bias_nsigma_edit must be finite and positive, got {n}"),
                });
            }
        }
        if let Some(grid) = &so.dem_grid_bias {
            if !(grid.spacing.is_finite() && grid.spacing > 0.0) {
                return Err(ConfigError::InvalidSolver {
                    reason: format!(
                        "dem_grid_bias.spacing must be finite and positive, got {}",
                        grid.spacing
                    ),
                });
            }
            for (name, v) in [
                ("expected_rms", grid.expected_rms),
                ("expected_rms_grad", grid.expected_rms_grad),
            ] {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(ConfigError::InvalidSolver {
                        reason: format!("dem_grid_bias.{name} must be finite and non-negative, got {v}"),
                    });
                }
            }
        }
        // 7. Lagrangian.
        if let Some(lagrangian) = &self.lagrangian {
            lagrangian.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = FitConfig::new((-150_000.0, -2_200_000.0));
        c.validate().unwrap();
        assert_eq!(c.domain().x, (-170_000.0, -130_000.0));
        assert_eq!(c.geometry().dz, 500.0);
    }

    #[test]
    fn orbital_window_is_ten_seconds_in_years() {
        let se = SensorErrorConfig::default();
        let w = se.window_years(SensorId(2)).unwrap();
        assert!((w - 10.0 / (24.0 * 3600.0 * 365.25)).abs() < 1e-18);
        let w = se.window_years(SensorId(4)).unwrap();
        assert!((w - 600.0 / (24.0 * 3600.0 * 365.25)).abs() < 1e-16);
        assert_eq!(se.window_years(SensorId(9)), None);
        assert_eq!(se.max_classified(), Some(5));
    }

    #[test]
    fn e_rms_overrides_merge_over_defaults() {
        let mut solver = SolverConfig::default();
        solver.e_rms.insert("d2z_dt2".to_string(), 100.0);
        let e = solver.resolved_e_rms();
        assert_eq!(e.len(), 4);
        assert_eq!(e["d2z_dt2"], 100.0);
        assert_eq!(e["d2z_dxdt"], 1.0);
    }

    #[test]
    fn parses_json_with_defaults() {
        let c = FitConfig::from_json(
            r#"{
                "center": [10000, -20000],
                "width": 20000,
                "spacing": {"dz": 1000},
                "fusion": {"firn_mode": "rescale", "extra_error": 0.5},
                "lagrangian": {"epoch": 2010.0}
            }"#,
        )
        .unwrap();
        assert_eq!(c.center, (10_000.0, -20_000.0));
        assert_eq!(c.spacing.dz, 1000.0);
        assert_eq!(c.spacing.dt, 0.5);
        assert_eq!(c.fusion.firn_mode, FirnMode::Rescale);
        assert_eq!(c.fusion.known_bad_epochs.len(), 1);
        assert_eq!(c.lagrangian.unwrap().epoch, 2010.0);
        assert_eq!(c.t_span, (2003.0, 2020.0));
    }

    #[test]
    fn solver_bias_settings_parse_and_validate() {
        let c = FitConfig::from_json(
            r#"{
                "center": [0, 0],
                "solver": {
                    "bias_nsigma_edit": 4,
                    "dem_grid_bias": {"spacing": 5000, "expected_rms": 2}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(c.solver.bias_nsigma_edit, Some(4.0));
        assert_eq!(c.solver.bias_nsigma_iteration, 6);
        let grid = c.solver.dem_grid_bias.unwrap();
        assert_eq!(grid.spacing, 5000.0);
        assert_eq!(grid.expected_rms, 2.0);
        assert_eq!(grid.expected_rms_grad, 1.0e-4);

        let mut c = FitConfig::new((0.0, 0.0));
        assert_eq!(c.solver.bias_nsigma_edit, Some(6.0));
        assert_eq!(c.solver.dem_grid_bias, None);
        c.solver.bias_nsigma_edit = Some(0.0);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidSolver { .. })));
        c.solver.bias_nsigma_edit = None;
        c.validate().unwrap();
        c.solver.dem_grid_bias = Some(GridBiasParams {
            spacing: f64::NAN,
            ..Default::default()
        });
        assert!(matches!(c.validate(), Err(ConfigError::InvalidSolver { .. })));
    }

    #[test]
    fn grid_bias_key_values_skip_comments_and_junk() {
        let params = GridBiasParams::from_key_values(
            "# DEM bias grid\n\
             spacing=20000 # metres\n\
             expected_rms = 0.5\n\
             expected_rms_grad=oops\n\
             smoothness=3\n\
             no equals sign\n",
        );
        assert_eq!(params.spacing, 20_000.0);
        assert_eq!(params.expected_rms, 0.5);
        assert_eq!(params.expected_rms_grad, 1.0e-4);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut c = FitConfig::new((0.0, 0.0));
        c.width = 0.0;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidDomain { .. })));

        let mut c = FitConfig::new((0.0, 0.0));
        c.t_span = (2020.0, 2003.0);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidTimeSpan { .. })));

        let mut c = FitConfig::new((0.0, 0.0));
        c.spacing.dt = -0.5;
        assert_eq!(
            c.validate(),
            Err(ConfigError::InvalidSpacing {
                name: "dt",
                value: -0.5
            })
        );

        let mut c = FitConfig::new((0.0, 0.0));
        c.sensor_error.airborne_sensors.push(2);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidSensorError { .. })));

        let mut c = FitConfig::new((0.0, 0.0));
        c.lagrangian = Some(LagrangianConfig {
            max_fill_passes: 0,
            ..Default::default()
        });
        assert!(matches!(c.validate(), Err(ConfigError::Lagrangian(_))));

        assert!(matches!(
            FitConfig::from_json("{\"width\": 1}"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
