//! Per-stage bookkeeping of observation assembly.

use altifit_core::{SensorDictionary, SensorId};
use indexmap::IndexMap;
use tracing::info;

use crate::sensor_error::InflationReport;

/// Rows in and out of one assembly stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageCount {
    /// Stage name.
    pub stage: &'static str,
    /// Rows before the stage.
    pub before: usize,
    /// Rows after the stage.
    pub after: usize,
}

impl StageCount {
    /// Rows the stage removed.
    pub fn dropped(&self) -> usize {
        self.before - self.after
    }
}

/// Summary of one [`FusionAssembly::assemble`](crate::FusionAssembly::assemble) run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FusionReport {
    /// Rows returned by each reader, in reader order.
    pub per_reader: IndexMap<String, usize>,
    /// Stages in execution order.
    pub stages: Vec<StageCount>,
    /// Final rows per sensor.
    pub per_sensor: IndexMap<SensorId, usize>,
    /// Final rows from DEM sensors.
    pub dem_rows: usize,
    /// Rows flagged as floating by the tide mask.
    pub floating_rows: usize,
    /// Error inflation outcome.
    pub inflation: InflationReport,
}

impl FusionReport {
    pub(crate) fn stage(&mut self, stage: &'static str, before: usize, after: usize) {
        info!(stage, retained = after, dropped = before - after, "assembly stage");
        self.stages.push(StageCount {
            stage,
            before,
            after,
        });
    }

    /// Count for a stage by name.
    pub fn stage_count(&self, stage: &str) -> Option<&StageCount> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Rows read before any masking.
    pub fn read(&self) -> usize {
        self.per_reader.values().sum()
    }

    /// Rows left after the last stage.
    pub fn retained(&self) -> usize {
        self.stages.last().map_or_else(|| self.read(), |s| s.after)
    }

    pub(crate) fn log_sensors(&self, sensors: &SensorDictionary) {
        for (id, count) in &self.per_sensor {
            if SensorDictionary::is_laser(*id) {
                info!(sensor = sensors.get(*id).unwrap_or("unknown"), count, "laser data");
            }
        }
        info!(count = self.dem_rows, "DEM data");
    }
}
