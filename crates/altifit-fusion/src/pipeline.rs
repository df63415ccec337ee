//! One fit tile, end to end.
//!
//! [`FitPipeline::run`] strings the stages together:
//!
//! ```text
//! velocity ──▶ LagrangianFrame ──advect_grid──▶ GridAdvection ─────────────┐
//!                    │                              │ bounds                │
//! readers ──▶ FusionAssembly (mask, correct, edit, inflate errors)          │
//!                    │                                                     │
//!                    └──advect_observations──▶ FitEngine ──restore_lagrangian──▶ FitProduct
//! ```
//!
//! Without a velocity ingest the Lagrangian steps are skipped and the
//! readers cover the fit domain only. [`FitPipeline::resume`] replaces
//! the readers with the observations of an earlier fit's
//! [`ResultLayout`].

use altifit_advect::{
    DataAdvectionReport, FrameGrids, GridAdvection, LagrangianFrame, ReferenceSurface,
};
use altifit_core::{SensorDictionary, SensorId};
use altifit_grid::{span_len, Extent};
use altifit_velocity::{GapFillReport, InterpolationScheme, VelocityIngest};
use indexmap::IndexMap;
use tracing::{info, instrument, warn};

use crate::assembly::{Assembled, FusionAssembly};
use crate::collaborators::{Corrections, CustomEdit, Masks, SensorReader};
use crate::config::{ConfigError, FitConfig};
use crate::engine::{FitEngine, FitOutput, FitRequest, SensorGridBias};
use crate::error::PipelineError;
use crate::layout::ResultLayout;
use crate::report::FusionReport;

/// Column holding elevations from before reference-surface subtraction.
const REFERENCE_ELEVATION: &str = "z0";

/// Summary of the Lagrangian part of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct LagrangianSummary {
    /// Interpolation scheme chosen for the velocity field.
    pub scheme: InterpolationScheme,
    /// Velocity gap filling.
    pub gap_fill: GapFillReport,
    /// Box covering the grid at every output epoch.
    pub grid_bounds: Extent,
    /// Grid nodes that left velocity coverage.
    pub unresolved_nodes: usize,
    /// Data pass outcome.
    pub data: DataAdvectionReport,
}

/// Everything a run produces.
#[derive(Clone, Debug)]
pub struct FitProduct {
    /// The fit, with Lagrangian coordinates undone.
    pub output: FitOutput,
    /// Sensors present in the run.
    pub sensors: SensorDictionary,
    /// Assembly stage counts.
    pub fusion: FusionReport,
    /// Present for Lagrangian runs.
    pub lagrangian: Option<LagrangianSummary>,
    /// Reference epoch index passed to the engine.
    pub reference_epoch: usize,
}

/// Orchestrates assembly, the Lagrangian frame and the fit engine.
pub struct FitPipeline {
    config: FitConfig,
    assembly: FusionAssembly,
    reference_surface: Option<Box<dyn ReferenceSurface>>,
}

impl std::fmt::Debug for FitPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitPipeline")
            .field("config", &self.config)
            .field("assembly", &self.assembly)
            .field(
                "reference_surface",
                &self.reference_surface.as_ref().map(|s| s.name().to_string()),
            )
            .finish()
    }
}

impl FitPipeline {
    /// Validate `config` and build a pipeline with no masks or corrections.
    pub fn new(config: FitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let assembly = FusionAssembly::new(&config, Masks::default(), Corrections::default());
        Ok(Self {
            config,
            assembly,
            reference_surface: None,
        })
    }

    /// Masks for assembly.
    pub fn with_masks(mut self, masks: Masks) -> Self {
        self.assembly = self.assembly.with_masks(masks);
        self
    }

    /// Correction models for assembly.
    pub fn with_corrections(mut self, corrections: Corrections) -> Self {
        self.assembly = self.assembly.with_corrections(corrections);
        self
    }

    /// Extra custom edit.
    pub fn with_edit(mut self, edit: Box<dyn CustomEdit>) -> Self {
        self.assembly = self.assembly.with_edit(edit);
        self
    }

    /// Surface subtracted before observations are advected.
    pub fn with_reference_surface(mut self, surface: Box<dyn ReferenceSurface>) -> Self {
        self.reference_surface = Some(surface);
        self
    }

    /// The validated configuration.
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Reference epoch index: the configured value, or the number of
    /// `dt` steps strictly inside `t_span`.
    pub fn reference_epoch(&self) -> usize {
        let (t0, t1) = self.config.t_span;
        self.config
            .reference_epoch
            .unwrap_or_else(|| span_len(t0, t1, self.config.spacing.dt))
    }

    /// Run one fit.
    ///
    /// # Errors
    ///
    /// Any failing stage aborts the run: assembly, the Lagrangian frame,
    /// the engine, or an empty observation set.
    #[instrument(skip_all, fields(center = ?self.config.center, lagrangian = velocity.is_some()))]
    pub fn run(
        &self,
        readers: &[Box<dyn SensorReader>],
        engine: &dyn FitEngine,
        velocity: Option<VelocityIngest>,
    ) -> Result<FitProduct, PipelineError> {
        let frame = self.load_frame(velocity)?;
        let extent = frame
            .as_ref()
            .map_or_else(|| self.config.domain(), |(_, grid)| grid.bounds);
        let assembled = self.assembly.assemble_within(readers, &extent)?;
        self.fit(assembled, frame, engine)
    }

    /// Run one fit on the observations saved in `prior`.
    ///
    /// No reader is consulted and no firn heights are recomputed; see
    /// [`FusionAssembly::reassemble`]. A reference surface subtracted by
    /// the earlier run is added back from the saved `z0` column before the
    /// observations are advected again.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus schema errors when `prior` has no
    /// usable `/data` group.
    #[instrument(skip_all, fields(center = ?self.config.center, lagrangian = velocity.is_some()))]
    pub fn resume(
        &self,
        prior: &ResultLayout,
        engine: &dyn FitEngine,
        velocity: Option<VelocityIngest>,
    ) -> Result<FitProduct, PipelineError> {
        let mut data = prior.observations()?;
        if data.contains_field(REFERENCE_ELEVATION) {
            let z = data.remove_field(REFERENCE_ELEVATION)?;
            data.z_mut().copy_from_slice(&z);
        }
        let mut sensors = prior.sensors();
        if sensors.is_empty() {
            sensors = SensorDictionary::with_laser_defaults();
        }
        let frame = self.load_frame(velocity)?;
        let assembled = self.assembly.reassemble(data, sensors)?;
        self.fit(assembled, frame, engine)
    }

    fn load_frame(
        &self,
        velocity: Option<VelocityIngest>,
    ) -> Result<Option<(LagrangianFrame, GridAdvection)>, PipelineError> {
        let Some(ingest) = velocity else {
            if self.config.lagrangian.is_some() {
                warn!("lagrangian settings given without a velocity ingest, fitting in place");
            }
            return Ok(None);
        };
        let settings = self.config.lagrangian.clone().unwrap_or_default();
        let grids = FrameGrids::from_config(&self.config.geometry())?;
        let frame = LagrangianFrame::load(grids, ingest, &settings)?;
        let grid = frame.advect_grid();
        Ok(Some((frame, grid)))
    }

    fn fit(
        &self,
        assembled: Assembled,
        frame: Option<(LagrangianFrame, GridAdvection)>,
        engine: &dyn FitEngine,
    ) -> Result<FitProduct, PipelineError> {
        let reference_epoch = self.reference_epoch();
        let mut data = assembled.data;
        let mut summary = None;
        if let Some((frame, grid)) = &frame {
            let advected = frame.advect_observations(data, self.reference_surface.as_deref())?;
            let (advected, report) = advected.into_parts();
            data = advected;
            summary = Some(LagrangianSummary {
                scheme: frame.scheme(),
                gap_fill: frame.gap_fill_report().clone(),
                grid_bounds: grid.bounds,
                unresolved_nodes: grid.unresolved_nodes,
                data: report,
            });
        }
        if data.is_empty() {
            return Err(PipelineError::NoData);
        }

        let laser: Vec<bool> = (0..data.len())
            .map(|i| data.sensor_at(i).is_some_and(SensorDictionary::is_laser))
            .collect();
        let mut sigma_extra_masks = IndexMap::new();
        sigma_extra_masks.insert("DEM".to_string(), laser.iter().map(|l| !l).collect());
        sigma_extra_masks.insert("laser".to_string(), laser);
        let data_slope_sensors: Vec<SensorId> = assembled.sensors.dem_sensors();
        let sensor_grid_bias: Vec<SensorGridBias> = match &self.config.solver.dem_grid_bias {
            Some(params) => data_slope_sensors
                .iter()
                .map(|&sensor| SensorGridBias::new(sensor, params.clone()))
                .collect(),
            None => Vec::new(),
        };

        info!(
            rows = data.len(),
            reference_epoch,
            dem_sensors = data_slope_sensors.len(),
            grid_biases = sensor_grid_bias.len(),
            "handing data to fit engine"
        );
        let request = FitRequest {
            data,
            center: self.config.center,
            width: self.config.width,
            t_span: self.config.t_span,
            spacing: self.config.spacing.clone(),
            reference_epoch,
            e_rms: self.config.solver.resolved_e_rms(),
            data_slope_sensors,
            sigma_extra_masks,
            bias_models: assembled.bias_models,
            sensor_grid_bias,
            solver: self.config.solver.clone(),
        };
        let mut output = engine.fit(request)?;
        if let Some((_, grid)) = &frame {
            output = restore(output, grid)?;
        }
        Ok(FitProduct {
            output,
            sensors: assembled.sensors,
            fusion: assembled.report,
            lagrangian: summary,
            reference_epoch,
        })
    }
}

fn restore(output: FitOutput, grid: &GridAdvection) -> Result<FitOutput, PipelineError> {
    let output = output.restore_lagrangian(grid)?;
    info!(unresolved = grid.unresolved_nodes, "fit mapped back to output epochs");
    Ok(output)
}
