//! The Lagrangian frame and its state transitions.

use altifit_core::{ObservationSet, SECONDS_PER_YEAR};
use altifit_grid::{Extent, Grid, SolvedGrid, SpatialGrid};
use altifit_velocity::{CropWindow, GapFillReport, InterpolationScheme, VelocityField, VelocityIngest};
use tracing::{debug, info, instrument, warn};

use crate::config::{FrameGeometry, LagrangianConfig};
use crate::displacement::{finite_range, DisplacementField};
use crate::error::LagrangianError;
use crate::integrator::ParcelIntegrator;
use crate::parcel::ParcelSet;

/// Elevation surface subtracted from observations before advection.
///
/// Removing a reference DEM leaves a residual that varies slowly in
/// space, so moving a point along the flow does not carry steep surface
/// topography with it.
pub trait ReferenceSurface {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Surface elevation at `(x, y)`; NaN where undefined.
    fn elevation(&self, x: f64, y: f64) -> f64;
}

// ── FrameGrids ─────────────────────────────────────────────────────

/// Output grid of the frame: the fit domain plus the epoch axis.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameGrids {
    geometry: FrameGeometry,
    spatial: SpatialGrid,
    t: Grid,
}

impl FrameGrids {
    /// Build the x, y and t axes.
    ///
    /// # Errors
    ///
    /// [`LagrangianError::Grid`] for a non-positive width or spacing, or
    /// an empty time span.
    pub fn from_config(geometry: &FrameGeometry) -> Result<Self, LagrangianError> {
        let spatial = SpatialGrid::centered(geometry.center, geometry.width, geometry.dz)?;
        let t = Grid::new("t", geometry.t_span, geometry.dt)?;
        Ok(Self {
            geometry: geometry.clone(),
            spatial,
            t,
        })
    }

    /// Node lattice.
    pub fn spatial(&self) -> &SpatialGrid {
        &self.spatial
    }

    /// Output epochs, decimal years.
    pub fn t(&self) -> &Grid {
        &self.t
    }

    /// Geometry the grids were built from.
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// The square fit domain `center ± width / 2`.
    pub fn domain(&self) -> Extent {
        Extent::centered(self.geometry.center, self.geometry.width)
    }
}

// ── LagrangianFrame ────────────────────────────────────────────────

/// A frame with its velocity field loaded, normalized and gap-filled.
#[derive(Debug)]
pub struct LagrangianFrame {
    grids: FrameGrids,
    field: VelocityField,
    config: LagrangianConfig,
    integrator: ParcelIntegrator,
    gap_fill: GapFillReport,
}

impl LagrangianFrame {
    /// Load velocity for the frame.
    ///
    /// The field is cropped to the domain plus the configured buffer,
    /// its epochs are converted to seconds from the reference epoch, and
    /// gaps inside the buffered domain are filled.
    ///
    /// # Errors
    ///
    /// Configuration, ingestion and coverage failures. All are fatal.
    #[instrument(skip_all, fields(epoch = config.epoch))]
    pub fn load(
        grids: FrameGrids,
        ingest: VelocityIngest,
        config: &LagrangianConfig,
    ) -> Result<Self, LagrangianError> {
        config.validate()?;
        let buffer = config.resolved_buffer(grids.geometry.width);
        let window = CropWindow::new(grids.domain(), buffer);
        let mut field = VelocityField::load(ingest, Some(&window))?;
        field.normalize_epochs(config.epoch)?;
        let gap_fill = field.fill_gaps(Some(&window.outer()), config.max_fill_passes)?;
        let integrator = ParcelIntegrator::new(field.preferred_scheme(), config.max_step_seconds)?;
        info!(
            scheme = %integrator.scheme(),
            buffer,
            max_speed = field.max_speed(),
            filled = gap_fill.temporal_filled + gap_fill.spatial_filled,
            "lagrangian frame ready"
        );
        Ok(Self {
            grids,
            field,
            config: config.clone(),
            integrator,
            gap_fill,
        })
    }

    /// Output grids.
    pub fn grids(&self) -> &FrameGrids {
        &self.grids
    }

    /// The prepared velocity field.
    pub fn field(&self) -> &VelocityField {
        &self.field
    }

    /// Run configuration.
    pub fn config(&self) -> &LagrangianConfig {
        &self.config
    }

    /// Interpolation scheme used for every pass.
    pub fn scheme(&self) -> InterpolationScheme {
        self.integrator.scheme()
    }

    /// Gap-filling counts from [`load`](Self::load).
    pub fn gap_fill_report(&self) -> &GapFillReport {
        &self.gap_fill
    }

    /// Seconds from the reference epoch to `t` (decimal years).
    fn offset(&self, t: f64) -> f64 {
        (t - self.config.epoch) * SECONDS_PER_YEAR
    }

    /// Advect every grid node from the reference epoch to each output epoch.
    ///
    /// Integration is chained from one epoch to the next; displacement is
    /// always measured from the node's un-advected position.
    #[instrument(skip_all)]
    pub fn advect_grid(&self) -> GridAdvection {
        let (ny, nx) = self.grids.spatial.shape();
        let epochs = self.grids.t.ctrs();
        let (xs, ys) = self.grids.spatial.mesh();
        let mut displacement = DisplacementField::new(ny, nx, epochs.len());
        let mut bounds = self.grids.spatial.extent();
        let mut state = ParcelSet {
            x: xs.clone(),
            y: ys.clone(),
            t: vec![0.0; xs.len()],
        };
        for (k, &epoch) in epochs.iter().enumerate() {
            let target = self.offset(epoch);
            let adv = self.integrator.advect(&state, &self.field, target);
            let dx: Vec<f64> = adv.x.iter().zip(&xs).map(|(a, b)| a - b).collect();
            let dy: Vec<f64> = adv.y.iter().zip(&ys).map(|(a, b)| a - b).collect();
            displacement.set_epoch(k, &dx, &dy);
            for (&x, &y) in adv.x.iter().zip(&adv.y) {
                bounds.include(x, y);
            }
            debug!(epoch, failures = adv.failures(), "grid nodes advected");
            state = adv.continue_from(target);
        }
        let unresolved_nodes = displacement.unresolved_nodes();
        if unresolved_nodes > 0 {
            warn!(unresolved_nodes, "grid nodes left velocity coverage");
        }
        info!(
            x_min = bounds.x.0,
            x_max = bounds.x.1,
            y_min = bounds.y.0,
            y_max = bounds.y.1,
            "advected grid bounds"
        );
        GridAdvection {
            displacement,
            bounds,
            unresolved_nodes,
            epochs: epochs.to_vec(),
        }
    }

    /// Advect observations to the reference epoch.
    ///
    /// With a reference surface, its elevation is subtracted first; the
    /// original elevations are kept in `z0` and rows without a finite
    /// residual are dropped. Original coordinates are kept in
    /// `x_original`/`y_original`. Rows that leave the domain or velocity
    /// coverage are dropped and counted separately.
    #[instrument(skip_all, fields(rows = data.len()))]
    pub fn advect_observations(
        &self,
        mut data: ObservationSet,
        reference: Option<&dyn ReferenceSurface>,
    ) -> Result<AdvectedObservations, LagrangianError> {
        let input = data.len();
        let mut reference_dropped = 0;
        if let Some(surface) = reference {
            let z0 = data.z().to_vec();
            let residual: Vec<f64> = data
                .x()
                .iter()
                .zip(data.y())
                .zip(&z0)
                .map(|((&x, &y), &z)| z - surface.elevation(x, y))
                .collect();
            data.assign("z0", z0)?;
            data.z_mut().copy_from_slice(&residual);
            let keep: Vec<bool> = residual.iter().map(|z| z.is_finite()).collect();
            reference_dropped = data.retain(&keep)?;
            info!(surface = surface.name(), dropped = reference_dropped, "reference surface subtracted");
        }

        let t: Vec<f64> = data.time().iter().map(|&t| self.offset(t)).collect();
        let parcels = ParcelSet::new(data.x().to_vec(), data.y().to_vec(), t)?;
        let adv = self.integrator.advect(&parcels, &self.field, 0.0);
        data.assign("x_original", adv.x0.clone())?;
        data.assign("y_original", adv.y0.clone())?;
        data.x_mut().copy_from_slice(&adv.x);
        data.y_mut().copy_from_slice(&adv.y);

        let domain = self.grids.domain();
        let mut numerical_failures = 0;
        let mut domain_exits = 0;
        let keep: Vec<bool> = adv
            .x
            .iter()
            .zip(&adv.y)
            .map(|(&x, &y)| {
                if !(x.is_finite() && y.is_finite()) {
                    numerical_failures += 1;
                    false
                } else if !domain.contains(x, y) {
                    domain_exits += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        data.retain(&keep)?;

        let report = DataAdvectionReport {
            input,
            reference_dropped,
            numerical_failures,
            domain_exits,
            retained: data.len(),
            dx_range: finite_range(&adv.dx),
            dy_range: finite_range(&adv.dy),
        };
        if let (Some(dx), Some(dy)) = (report.dx_range, report.dy_range) {
            info!(
                dx_min = dx.0,
                dx_max = dx.1,
                dy_min = dy.0,
                dy_max = dy.1,
                "observation displacement"
            );
        }
        info!(
            retained = report.retained,
            domain_exits,
            numerical_failures,
            "observations advected to reference epoch"
        );
        Ok(AdvectedObservations { data, report })
    }
}

// ── Pass results ───────────────────────────────────────────────────

/// Result of the grid pass.
#[derive(Clone, Debug, PartialEq)]
pub struct GridAdvection {
    /// Node displacement at every output epoch.
    pub displacement: DisplacementField,
    /// Box covering the un-advected grid and every advected node.
    pub bounds: Extent,
    /// Nodes with an undefined displacement at some epoch.
    pub unresolved_nodes: usize,
    /// Output epochs, decimal years.
    pub epochs: Vec<f64>,
}

impl GridAdvection {
    /// Attach the displacement to the solved elevation-change grid.
    ///
    /// # Errors
    ///
    /// [`LagrangianError::ShapeMismatch`] when `dz` is not `(ny, nx, nt)`
    /// of this pass.
    pub fn attach_to(&self, dz: &mut SolvedGrid) -> Result<(), LagrangianError> {
        let expected = self.displacement.shape();
        let found = dz.shape();
        if found != expected {
            return Err(LagrangianError::ShapeMismatch { expected, found });
        }
        let (dx, dy) = self.displacement.clone().into_parts();
        dz.dx = Some(dx);
        dz.dy = Some(dy);
        Ok(())
    }
}

/// Per-row outcome counts of the data pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataAdvectionReport {
    /// Rows passed in.
    pub input: usize,
    /// Rows dropped for an undefined reference-surface residual.
    pub reference_dropped: usize,
    /// Rows whose trajectory left velocity coverage.
    pub numerical_failures: usize,
    /// Rows advected outside the domain.
    pub domain_exits: usize,
    /// Rows kept.
    pub retained: usize,
    /// Finite `(min, max)` eastward displacement.
    pub dx_range: Option<(f64, f64)>,
    /// Finite `(min, max)` northward displacement.
    pub dy_range: Option<(f64, f64)>,
}

/// Observations moved to the reference epoch, ready for the fit.
#[derive(Clone, Debug)]
pub struct AdvectedObservations {
    data: ObservationSet,
    report: DataAdvectionReport,
}

impl AdvectedObservations {
    /// The advected observations.
    pub fn data(&self) -> &ObservationSet {
        &self.data
    }

    /// Outcome counts.
    pub fn report(&self) -> &DataAdvectionReport {
        &self.report
    }

    /// Split into data and report.
    pub fn into_parts(self) -> (ObservationSet, DataAdvectionReport) {
        (self.data, self.report)
    }
}

/// Undo the data pass on observations echoed back by the fit.
///
/// Restores `x`/`y` from `x_original`/`y_original` and removes those
/// columns.
///
/// # Errors
///
/// [`LagrangianError::Schema`] if the original-coordinate columns are
/// missing.
pub fn restore_coordinates(data: &mut ObservationSet) -> Result<(), LagrangianError> {
    let x0 = data.remove_field("x_original")?;
    let y0 = data.remove_field("y_original")?;
    data.x_mut().copy_from_slice(&x0);
    data.y_mut().copy_from_slice(&y0);
    Ok(())
}
