//! Observation assembly: read, mask, correct, edit and weight.
//!
//! [`FusionAssembly::assemble`] runs a fixed sequence of stages over the
//! concatenated reader output. Every stage after reading either drops
//! rows through a boolean mask or rewrites columns in place, and records
//! its row counts in the [`FusionReport`].

use altifit_core::{ObservationSet, SchemaError, SensorDictionary, DAYS_PER_YEAR};
use altifit_grid::Extent;
use tracing::{debug, info, instrument};

use crate::collaborators::{CorrectionModel, Corrections, CustomEdit, Masks, SensorReader};
use crate::config::{FirnMode, FitConfig};
use crate::engine::BiasModelSpec;
use crate::error::FusionError;
use crate::report::FusionReport;
use crate::sensor_error::SensorErrorModel;

/// Location-mask values at or below this are dropped.
const LOCATION_THRESHOLD: f64 = 0.1;
/// Year-mask values below this are dropped.
const YEAR_MASK_THRESHOLD: f64 = 0.5;
/// Tide-mask values above this mark floating ice.
const FLOATING_THRESHOLD: f64 = 0.5;
/// Reader name recorded for rows taken from a saved fit.
const RESUMED: &str = "resumed";

/// Result of [`FusionAssembly::assemble`].
#[derive(Clone, Debug)]
pub struct Assembled {
    /// The fused observations.
    pub data: ObservationSet,
    /// Every sensor seen, laser defaults included.
    pub sensors: SensorDictionary,
    /// Stage counts.
    pub report: FusionReport,
    /// Bias models requested by the corrections (firn rescaling).
    pub bias_models: Vec<BiasModelSpec>,
}

/// Assembles the fused observation set for one fit tile.
pub struct FusionAssembly {
    config: FitConfig,
    masks: Masks,
    corrections: Corrections,
    edits: Vec<Box<dyn CustomEdit>>,
    error_model: SensorErrorModel,
}

impl std::fmt::Debug for FusionAssembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionAssembly")
            .field("masks", &self.masks)
            .field("corrections", &self.corrections)
            .field(
                "edits",
                &self.edits.iter().map(|e| e.name().to_string()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl FusionAssembly {
    /// Assembly for `config` with the given masks and corrections.
    ///
    /// The configured known-bad epochs become the first custom edits.
    pub fn new(config: &FitConfig, masks: Masks, corrections: Corrections) -> Self {
        let edits: Vec<Box<dyn CustomEdit>> = config
            .fusion
            .known_bad_epochs
            .iter()
            .map(|e| Box::new(e.clone()) as Box<dyn CustomEdit>)
            .collect();
        Self {
            config: config.clone(),
            masks,
            corrections,
            edits,
            error_model: SensorErrorModel::new(config.sensor_error.clone()),
        }
    }

    /// Replace the masks.
    pub fn with_masks(mut self, masks: Masks) -> Self {
        self.masks = masks;
        self
    }

    /// Replace the correction models.
    pub fn with_corrections(mut self, corrections: Corrections) -> Self {
        self.corrections = corrections;
        self
    }

    /// Add a custom edit, run after the known-bad epochs.
    pub fn with_edit(mut self, edit: Box<dyn CustomEdit>) -> Self {
        self.edits.push(edit);
        self
    }

    /// Assemble observations read over the fit domain.
    pub fn assemble(&self, readers: &[Box<dyn SensorReader>]) -> Result<Assembled, FusionError> {
        self.assemble_within(readers, &self.config.domain())
    }

    /// Assemble observations read over `extent`.
    ///
    /// Lagrangian runs read over the bounds of the advected grid, which
    /// covers every point that can be carried into the domain.
    ///
    /// # Errors
    ///
    /// Reader and correction failures, or a step enabled without its
    /// collaborator.
    #[instrument(skip_all, fields(readers = readers.len()))]
    pub fn assemble_within(
        &self,
        readers: &[Box<dyn SensorReader>],
        extent: &Extent,
    ) -> Result<Assembled, FusionError> {
        let mut report = FusionReport::default();
        let mut sensors = SensorDictionary::with_laser_defaults();

        // 1. Read.
        let mut sets = Vec::with_capacity(readers.len());
        for reader in readers {
            let set = reader.read(extent, &mut sensors)?;
            let rows = set.as_ref().map_or(0, ObservationSet::len);
            info!(reader = reader.name(), rows, "reader finished");
            report.per_reader.insert(reader.name().to_string(), rows);
            sets.extend(set);
        }
        let mut data = ObservationSet::concat(sets);
        let day: Vec<f64> = data.time().iter().map(|t| (t * DAYS_PER_YEAR).floor()).collect();
        data.assign("day", day)?;
        self.apply_extra_error(&mut data);

        self.location_mask(&mut data, &mut report)?;
        self.water_mask(&mut data, &mut report)?;
        self.year_mask(&mut data, &mut report)?;
        self.tide(&mut data, &mut report)?;
        let bias_models = self.firn(&mut data, &mut report)?;
        self.custom_edits(&mut data, &mut report)?;
        report.inflation = self.error_model.inflate(&mut data)?;
        Ok(finish(data, sensors, report, bias_models))
    }

    /// Re-assemble observations saved by an earlier fit.
    ///
    /// Reading, the location and water masks, extra error and tides
    /// already shaped the saved rows and are not repeated. The year masks
    /// and custom edits run again. Firn heights are not recomputed: a
    /// rescaling run re-requests its scale model over the saved `h_firn`
    /// column. Rows that already carry `time_corr` keep their inflated
    /// `sigma_corr`.
    ///
    /// # Errors
    ///
    /// A rescaling run without its firn model or `h_firn` column, and
    /// column bookkeeping failures.
    #[instrument(skip_all, fields(rows = data.len()))]
    pub fn reassemble(
        &self,
        mut data: ObservationSet,
        sensors: SensorDictionary,
    ) -> Result<Assembled, FusionError> {
        let mut report = FusionReport::default();
        report.per_reader.insert(RESUMED.to_string(), data.len());
        info!(rows = data.len(), "resuming from saved observations");
        if !data.contains_field("day") {
            let day: Vec<f64> = data.time().iter().map(|t| (t * DAYS_PER_YEAR).floor()).collect();
            data.assign("day", day)?;
        }

        self.year_mask(&mut data, &mut report)?;
        let bias_models = self.resumed_firn(&data)?;
        self.custom_edits(&mut data, &mut report)?;
        if data.contains_field("time_corr") {
            debug!("saved rows carry time_corr, errors already inflated");
        } else {
            report.inflation = self.error_model.inflate(&mut data)?;
        }
        Ok(finish(data, sensors, report, bias_models))
    }

    fn resumed_firn(&self, data: &ObservationSet) -> Result<Vec<BiasModelSpec>, FusionError> {
        if self.config.fusion.firn_mode != FirnMode::Rescale {
            return Ok(Vec::new());
        }
        let model = self
            .corrections
            .firn
            .as_ref()
            .ok_or(FusionError::MissingCollaborator { what: "firn model" })?;
        if !data.contains_field("h_firn") {
            return Err(SchemaError::MissingField {
                name: "h_firn".to_string(),
            }
            .into());
        }
        let bias = BiasModelSpec::firn_scale(model.name(), self.config.center, self.config.width)?;
        info!(name = %bias.name, "firn scale bias model requested");
        Ok(vec![bias])
    }

    fn apply_extra_error(&self, data: &mut ObservationSet) {
        let Some(extra) = self.config.fusion.extra_error else {
            return;
        };
        let before = self.config.fusion.extra_error_before;
        let time = data.time().to_vec();
        let mut raised = 0usize;
        for (s, t) in data.sigma_mut().iter_mut().zip(&time) {
            if *t < before {
                *s = s.hypot(extra);
                raised += 1;
            }
        }
        debug!(raised, extra, before, "extra error applied");
    }

    // 2. Location mask.
    fn location_mask(
        &self,
        data: &mut ObservationSet,
        report: &mut FusionReport,
    ) -> Result<(), FusionError> {
        let Some(mask) = &self.masks.location else {
            return Ok(());
        };
        let before = data.len();
        let keep: Vec<bool> = mask
            .sample_many(data.x(), data.y())
            .iter()
            .map(|&v| v > LOCATION_THRESHOLD)
            .collect();
        data.retain(&keep)?;
        report.stage("location_mask", before, data.len());
        Ok(())
    }

    // 3. Geoid and water mask.
    fn water_mask(
        &self,
        data: &mut ObservationSet,
        report: &mut FusionReport,
    ) -> Result<(), FusionError> {
        let threshold = self.config.fusion.water_mask_threshold;
        let geoid = match (&self.corrections.geoid, threshold) {
            (Some(geoid), _) => geoid,
            (None, Some(_)) => {
                return Err(FusionError::MissingCollaborator {
                    what: "geoid raster",
                })
            }
            (None, None) => return Ok(()),
        };
        let values = geoid.sample_many(data.x(), data.y());
        let keep: Option<Vec<bool>> = threshold.map(|threshold| {
            data.z()
                .iter()
                .zip(&values)
                .map(|(z, g)| z - g > threshold)
                .collect()
        });
        data.assign("geoid", values)?;
        if let Some(keep) = keep {
            let before = data.len();
            data.retain(&keep)?;
            report.stage("water_mask", before, data.len());
        }
        Ok(())
    }

    // 4. Per-year validity masks.
    fn year_mask(
        &self,
        data: &mut ObservationSet,
        report: &mut FusionReport,
    ) -> Result<(), FusionError> {
        if self.masks.by_year.is_empty() {
            return Ok(());
        }
        let mut masks: Vec<_> = self.masks.by_year.iter().collect();
        masks.sort_by(|a, b| a.0.total_cmp(&b.0));
        let years: Vec<f64> = masks.iter().map(|(year, _)| *year).collect();
        // Number of mask years strictly before each observation; rows
        // older than every mask are left alone.
        let slot: Vec<usize> = data
            .time()
            .iter()
            .map(|t| years.partition_point(|y| y < t))
            .collect();

        let before = data.len();
        let mut keep = vec![true; before];
        for (k, (year, raster)) in masks.iter().enumerate() {
            let rows: Vec<usize> = (0..before).filter(|&i| slot[i] == k + 1).collect();
            if rows.is_empty() {
                continue;
            }
            let x: Vec<f64> = rows.iter().map(|&i| data.x()[i]).collect();
            let y: Vec<f64> = rows.iter().map(|&i| data.y()[i]).collect();
            for (&i, v) in rows.iter().zip(raster.sample_many(&x, &y)) {
                if v.is_finite() && v < YEAR_MASK_THRESHOLD {
                    keep[i] = false;
                }
            }
            debug!(year, rows = rows.len(), mask = raster.name(), "year mask applied");
        }
        data.retain(&keep)?;
        report.stage("year_mask", before, data.len());
        Ok(())
    }

    // 5. Tides on floating ice.
    fn tide(&self, data: &mut ObservationSet, report: &mut FusionReport) -> Result<(), FusionError> {
        let Some(tide) = &self.corrections.tide else {
            return Ok(());
        };
        let n = data.len();
        let floating: Vec<usize> = tide
            .mask
            .sample_many(data.x(), data.y())
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > FLOATING_THRESHOLD)
            .map(|(i, _)| i)
            .collect();
        let mut tide_ocean = vec![0.0; n];
        if !floating.is_empty() {
            let pick = |col: &[f64]| floating.iter().map(|&i| col[i]).collect::<Vec<f64>>();
            let (x, y, t) = (pick(data.x()), pick(data.y()), pick(data.time()));
            let values = checked(tide.model.as_ref(), tide.model.correct(&x, &y, &t)?, floating.len())?;
            for (&i, v) in floating.iter().zip(values) {
                if v.is_finite() {
                    tide_ocean[i] = v;
                }
            }
        }
        for (z, t) in data.z_mut().iter_mut().zip(&tide_ocean) {
            *z -= t;
        }
        data.assign("tide_ocean", tide_ocean)?;
        report.floating_rows = floating.len();
        info!(model = tide.model.name(), floating = floating.len(), "tide correction applied");
        report.stage("tide", n, data.len());
        Ok(())
    }

    // 6. Firn.
    fn firn(
        &self,
        data: &mut ObservationSet,
        report: &mut FusionReport,
    ) -> Result<Vec<BiasModelSpec>, FusionError> {
        let mode = self.config.fusion.firn_mode;
        if mode == FirnMode::Off {
            return Ok(Vec::new());
        }
        let model = self
            .corrections
            .firn
            .as_ref()
            .ok_or(FusionError::MissingCollaborator { what: "firn model" })?;
        let before = data.len();
        let h = model.correct(data.x(), data.y(), data.time())?;
        let h = checked(model.as_ref(), h, before)?;
        let keep: Vec<bool> = h.iter().map(|v| v.is_finite()).collect();
        data.assign("h_firn", h)?;
        data.retain(&keep)?;
        report.stage("firn", before, data.len());

        match mode {
            FirnMode::Fixed => {
                let h = data.field("h_firn").map(<[f64]>::to_vec).unwrap_or_default();
                for (z, h) in data.z_mut().iter_mut().zip(&h) {
                    *z -= h;
                }
                Ok(Vec::new())
            }
            FirnMode::Rescale => {
                let bias = BiasModelSpec::firn_scale(
                    model.name(),
                    self.config.center,
                    self.config.width,
                )?;
                info!(name = %bias.name, "firn scale bias model requested");
                Ok(vec![bias])
            }
            FirnMode::Off => Ok(Vec::new()),
        }
    }

    // 7. Custom edits.
    fn custom_edits(
        &self,
        data: &mut ObservationSet,
        report: &mut FusionReport,
    ) -> Result<(), FusionError> {
        let before = data.len();
        for edit in &self.edits {
            let keep = edit.keep(data);
            let dropped = data.retain(&keep)?;
            debug!(edit = edit.name(), dropped, "custom edit");
        }
        report.stage("custom_edits", before, data.len());
        Ok(())
    }
}

fn finish(
    data: ObservationSet,
    sensors: SensorDictionary,
    mut report: FusionReport,
    bias_models: Vec<BiasModelSpec>,
) -> Assembled {
    report.per_sensor = data.count_by_sensor();
    report.dem_rows = report
        .per_sensor
        .iter()
        .filter(|(id, _)| !SensorDictionary::is_laser(**id))
        .map(|(_, n)| n)
        .sum();
    report.log_sensors(&sensors);
    Assembled {
        data,
        sensors,
        report,
        bias_models,
    }
}

fn checked(
    model: &dyn CorrectionModel,
    values: Vec<f64>,
    expected: usize,
) -> Result<Vec<f64>, FusionError> {
    if values.len() != expected {
        return Err(FusionError::Correction {
            name: model.name().to_string(),
            reason: format!("returned {} values for {expected} points", values.len()),
        });
    }
    Ok(values)
}
