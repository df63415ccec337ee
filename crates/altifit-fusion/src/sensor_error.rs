//! Correlated-error inflation by sensor and time bucket.
//!
//! Observations from one sensor pass share systematic errors that scale
//! with surface slope. Grouping rows into short time buckets per sensor
//! and inflating `sigma_corr` by the bucket-mean slope lets the fit weight
//! steep-terrain passes down as a unit.

use altifit_core::{ObservationSet, SchemaError, SensorId};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::SensorErrorConfig;

/// Outcome of one [`SensorErrorModel::inflate`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InflationReport {
    /// Distinct `(sensor, time_corr)` buckets.
    pub buckets: usize,
    /// Buckets whose members were inflated.
    pub inflated_buckets: usize,
    /// Buckets skipped because their sensor is not classified (DEMs).
    pub skipped_buckets: usize,
    /// Largest slope term `mean_slope * scale` applied.
    pub max_slope_term: f64,
}

/// Sensor/time-bucketed error model.
#[derive(Clone, Debug)]
pub struct SensorErrorModel {
    config: SensorErrorConfig,
}

impl SensorErrorModel {
    /// Model with the given sensor classes and bucket widths.
    pub fn new(config: SensorErrorConfig) -> Self {
        Self { config }
    }

    /// Bucket key for one row: time floored to the sensor's window, or the
    /// raw time for unclassified sensors.
    pub fn bucket_time(&self, sensor: Option<SensorId>, time: f64) -> f64 {
        match sensor.and_then(|s| self.config.window_years(s)) {
            Some(w) => (time / w).floor() * w,
            None => time,
        }
    }

    /// Assign `time_corr` and inflate `sigma_corr` in place.
    ///
    /// # Errors
    ///
    /// Only column bookkeeping can fail.
    pub fn inflate(&self, data: &mut ObservationSet) -> Result<InflationReport, SchemaError> {
        let n = data.len();
        let sensors: Vec<Option<SensorId>> = (0..n).map(|i| data.sensor_at(i)).collect();
        let time_corr: Vec<f64> = sensors
            .iter()
            .zip(data.time())
            .map(|(&s, &t)| self.bucket_time(s, t))
            .collect();

        let mut groups: IndexMap<(u32, u64), Vec<usize>> = IndexMap::new();
        for (i, (sensor, t)) in sensors.iter().zip(&time_corr).enumerate() {
            if let Some(sensor) = sensor {
                groups.entry((sensor.0, t.to_bits())).or_default().push(i);
            }
        }

        let max_classified = self.config.max_classified().unwrap_or(0);
        let scale = self.config.slope_sigma_scale;
        let mut report = InflationReport {
            buckets: groups.len(),
            ..Default::default()
        };
        let slope = data.slope_mag().to_vec();
        let sigma_corr = data.sigma_corr_mut();
        for ((sensor, _), rows) in &groups {
            if *sensor > max_classified {
                report.skipped_buckets += 1;
                continue;
            }
            let term = nan_mean(rows.iter().map(|&i| slope[i])).unwrap_or(0.0) * scale;
            for &i in rows {
                sigma_corr[i] = sigma_corr[i].hypot(term);
            }
            report.inflated_buckets += 1;
            if term.abs() > report.max_slope_term {
                report.max_slope_term = term.abs();
            }
        }
        debug!(buckets = report.buckets, skipped = report.skipped_buckets, "sensor buckets");
        data.assign("time_corr", time_corr)?;
        info!(
            inflated = report.inflated_buckets,
            max_slope_term = report.max_slope_term,
            "correlated errors inflated"
        );
        Ok(report)
    }
}

fn nan_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
