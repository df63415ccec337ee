//! Interface to the external least-squares surface fit.
//!
//! The fit itself is not part of this workspace. [`FitRequest`] carries
//! everything the engine needs; [`FitOutput`] is what it hands back. The
//! pipeline owns both ends of the exchange.

use altifit_advect::{restore_coordinates, GridAdvection};
use altifit_core::{ObservationSet, SensorId};
use altifit_grid::{GridError, SolvedGrid, SpatialGrid};
use indexmap::IndexMap;

use crate::config::{GridBiasParams, SolverConfig, Spacing};
use crate::error::{EngineError, PipelineError};

/// The external surface-fitting engine.
pub trait FitEngine {
    /// Solve for the surface grids.
    fn fit(&self, request: FitRequest) -> Result<FitOutput, EngineError>;
}

/// Spatially varying scale factor on a data column, solved by the fit.
#[derive(Clone, Debug, PartialEq)]
pub struct BiasModelSpec {
    /// Model name.
    pub name: String,
    /// Data column the scale multiplies.
    pub param: String,
    /// Coarse grid on which the scale is solved.
    pub grid: SpatialGrid,
    /// Expected RMS of the scale.
    pub expected_rms: f64,
    /// Prior value of the scale.
    pub expected_value: f64,
}

impl BiasModelSpec {
    /// Scale on `h_firn`, one node at each domain corner.
    pub fn firn_scale(model: &str, center: (f64, f64), width: f64) -> Result<Self, GridError> {
        Ok(Self {
            name: format!("{model}_scale"),
            param: "h_firn".to_string(),
            grid: SpatialGrid::centered(center, width, width)?,
            expected_rms: 0.25,
            expected_value: 1.0,
        })
    }
}

/// Bias grid solved for one DEM sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorGridBias {
    /// The DEM sensor.
    pub sensor: SensorId,
    /// Prior value of the bias, m.
    pub expected_value: f64,
    /// Grid shape and expected RMS values.
    pub params: GridBiasParams,
}

impl SensorGridBias {
    /// Zero-mean bias grid for `sensor`.
    pub fn new(sensor: SensorId, params: GridBiasParams) -> Self {
        Self {
            sensor,
            expected_value: 0.0,
            params,
        }
    }

    /// Name under which the engine returns the solved grid.
    pub fn name(&self) -> String {
        format!("sensor_{}_bias", self.sensor.0)
    }
}

/// Solved planar slope bias of one DEM sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlopeBias {
    /// Slope along x, m/m.
    pub x: f64,
    /// Slope along y, m/m.
    pub y: f64,
}

/// Everything the engine needs for one fit.
#[derive(Clone, Debug, PartialEq)]
pub struct FitRequest {
    /// Observations, already corrected and (for Lagrangian runs) advected.
    pub data: ObservationSet,
    /// Domain centre.
    pub center: (f64, f64),
    /// Domain side length.
    pub width: f64,
    /// First and last output epochs.
    pub t_span: (f64, f64),
    /// Grid spacings.
    pub spacing: Spacing,
    /// Index of the epoch elevation change is measured from.
    pub reference_epoch: usize,
    /// Expected-RMS constraints, defaults merged with overrides.
    pub e_rms: IndexMap<String, f64>,
    /// Sensors whose slope biases are solved for (DEMs).
    pub data_slope_sensors: Vec<SensorId>,
    /// Row masks selecting observations for extra-error terms (`laser`,
    /// `DEM`).
    pub sigma_extra_masks: IndexMap<String, Vec<bool>>,
    /// Bias-model requests.
    pub bias_models: Vec<BiasModelSpec>,
    /// Per-sensor bias grids to solve, one per DEM sensor when enabled.
    pub sensor_grid_bias: Vec<SensorGridBias>,
    /// Engine parameters passed through.
    pub solver: SolverConfig,
}

/// What the engine returns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitOutput {
    /// Solved grids by name (`z0`, `dz`, `dzdt_lag1`, ...).
    pub grids: IndexMap<String, SolvedGrid>,
    /// The observations echoed back, with fit residuals if any.
    pub data: ObservationSet,
    /// Error grids by the name of the grid they describe.
    pub errors: IndexMap<String, SolvedGrid>,
    /// Residual RMS by constraint or sensor.
    pub rms: IndexMap<String, f64>,
    /// Expected RMS values the fit used.
    pub e_rms: IndexMap<String, f64>,
    /// Solved bias parameters by name.
    pub bias: IndexMap<String, Vec<f64>>,
    /// Solved slope biases of the [`FitRequest::data_slope_sensors`].
    pub slope_bias: IndexMap<SensorId, SlopeBias>,
    /// Solved per-sensor bias grids by [`SensorGridBias::name`].
    pub grid_bias: IndexMap<String, SolvedGrid>,
    /// Stage timings, seconds.
    pub timing: IndexMap<String, f64>,
}

impl FitOutput {
    /// Undo the Lagrangian transform on a returned fit.
    ///
    /// Restores the original observation coordinates and attaches the
    /// node displacement of the grid pass to the `dz` grid.
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingGrid`] without a `dz` grid;
    /// [`PipelineError::Lagrangian`] for missing original coordinates or a
    /// shape mismatch.
    pub fn restore_lagrangian(mut self, advection: &GridAdvection) -> Result<Self, PipelineError> {
        restore_coordinates(&mut self.data)?;
        let dz = self
            .grids
            .get_mut("dz")
            .ok_or_else(|| PipelineError::MissingGrid {
                name: "dz".to_string(),
            })?;
        advection.attach_to(dz)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use altifit_advect::{DisplacementField, LagrangianError};
    use altifit_grid::Extent;

    #[test]
    fn firn_scale_grid_has_corner_nodes() {
        let bias = BiasModelSpec::firn_scale("GSFC-fdm", (1000.0, -2000.0), 40_000.0).unwrap();
        assert_eq!(bias.name, "GSFC-fdm_scale");
        assert_eq!(bias.param, "h_firn");
        assert_eq!(bias.grid.shape(), (2, 2));
        assert_eq!(bias.grid.node(0, 0), Some((-19_000.0, -22_000.0)));
        assert_eq!(bias.grid.node(1, 1), Some((21_000.0, 18_000.0)));
    }

    #[test]
    fn sensor_grid_bias_is_zero_mean_and_named_by_sensor() {
        let bias = SensorGridBias::new(SensorId(7), GridBiasParams::default());
        assert_eq!(bias.name(), "sensor_7_bias");
        assert_eq!(bias.expected_value, 0.0);
        assert_eq!(bias.params.spacing, 10_000.0);
    }

    fn advection(ny: usize, nx: usize, nt: usize) -> GridAdvection {
        GridAdvection {
            displacement: DisplacementField::new(ny, nx, nt),
            bounds: Extent::new((0.0, 1.0), (0.0, 1.0)),
            unresolved_nodes: 0,
            epochs: vec![2000.0; nt],
        }
    }

    fn echoed() -> ObservationSet {
        let mut cols = IndexMap::new();
        for name in altifit_core::REQUIRED_FIELDS {
            cols.insert(name.to_string(), vec![5.0]);
        }
        cols.insert("x_original".to_string(), vec![1.0]);
        cols.insert("y_original".to_string(), vec![2.0]);
        ObservationSet::from_columns(cols).unwrap()
    }

    #[test]
    fn restore_needs_dz_grid() {
        let out = FitOutput {
            data: echoed(),
            ..Default::default()
        };
        assert_eq!(
            out.restore_lagrangian(&advection(2, 2, 1)),
            Err(PipelineError::MissingGrid {
                name: "dz".to_string()
            })
        );
    }

    #[test]
    fn restore_attaches_displacement_and_coordinates() {
        let mut out = FitOutput {
            data: echoed(),
            ..Default::default()
        };
        out.grids.insert(
            "dz".to_string(),
            SolvedGrid::filled(vec![0.0, 1.0], vec![0.0, 1.0], Some(vec![2000.0]), 0.0),
        );
        let out = out.restore_lagrangian(&advection(2, 2, 1)).unwrap();
        assert_eq!(out.data.x(), &[1.0]);
        assert_eq!(out.data.y(), &[2.0]);
        assert!(!out.data.contains_field("x_original"));
        assert!(out.grids["dz"].has_displacement());
    }

    #[test]
    fn restore_rejects_shape_mismatch() {
        let mut out = FitOutput {
            data: echoed(),
            ..Default::default()
        };
        out.grids.insert(
            "dz".to_string(),
            SolvedGrid::filled(vec![0.0, 1.0, 2.0], vec![0.0, 1.0], Some(vec![2000.0]), 0.0),
        );
        assert!(matches!(
            out.restore_lagrangian(&advection(2, 2, 1)),
            Err(PipelineError::Lagrangian(LagrangianError::ShapeMismatch { .. }))
        ));
    }
}
