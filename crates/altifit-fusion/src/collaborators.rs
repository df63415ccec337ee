//! Interfaces to the external pieces that feed observation assembly.
//!
//! Readers, rasters and correction models are supplied by the caller.
//! Assembly only sees these traits, so each can be backed by real files
//! in production and by closures or constants in tests.

use altifit_core::{ObservationSet, SensorDictionary, DAYS_PER_YEAR};
use altifit_grid::Extent;
use serde::Deserialize;

use crate::error::FusionError;

/// Source of observations from one sensor family.
pub trait SensorReader {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Read every observation inside `domain`.
    ///
    /// DEM readers register each strip in `sensors` and write the
    /// returned codes into the `sensor` column. `Ok(None)` means the
    /// reader has nothing for this domain.
    fn read(
        &self,
        domain: &Extent,
        sensors: &mut SensorDictionary,
    ) -> Result<Option<ObservationSet>, FusionError>;
}

/// A gridded scalar that can be sampled at arbitrary points.
pub trait Raster {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Value at `(x, y)`; NaN outside the raster or on no-data cells.
    fn sample(&self, x: f64, y: f64) -> f64;

    /// Sample at every point of two parallel coordinate slices.
    fn sample_many(&self, x: &[f64], y: &[f64]) -> Vec<f64> {
        x.iter().zip(y).map(|(&x, &y)| self.sample(x, y)).collect()
    }
}

/// Time-dependent correction (tide or firn model).
pub trait CorrectionModel {
    /// Name used in logs, errors and bias-model names.
    fn name(&self) -> &str;

    /// Correction in metres for each point, NaN where undefined.
    ///
    /// Must return exactly one value per input point.
    fn correct(&self, x: &[f64], y: &[f64], time: &[f64]) -> Result<Vec<f64>, FusionError>;
}

/// Row-level edit applied after all corrections.
pub trait CustomEdit {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// `true` for rows to keep.
    fn keep(&self, data: &ObservationSet) -> Vec<bool>;
}

/// Drops observations acquired at a known-bad epoch.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct KnownBadEpoch {
    /// Decimal-year timestamp of the bad acquisition.
    pub time: f64,
    /// Half-width of the rejection window, decimal years.
    pub tolerance: f64,
}

impl Default for KnownBadEpoch {
    /// The ICESat campaign at 2003.7821, rejected within one hour.
    fn default() -> Self {
        Self {
            time: 2003.7821,
            tolerance: 0.1 / 24.0 / DAYS_PER_YEAR,
        }
    }
}

impl CustomEdit for KnownBadEpoch {
    fn name(&self) -> &str {
        "known_bad_epoch"
    }

    fn keep(&self, data: &ObservationSet) -> Vec<bool> {
        data.time()
            .iter()
            .map(|t| !((t - self.time).abs() < self.tolerance))
            .collect()
    }
}

/// Masks applied during assembly. Every entry is optional.
#[derive(Default)]
pub struct Masks {
    /// Location mask; points sampling at or below 0.1 are dropped.
    pub location: Option<Box<dyn Raster>>,
    /// Per-year validity masks keyed by decimal year.
    pub by_year: Vec<(f64, Box<dyn Raster>)>,
}

impl std::fmt::Debug for Masks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Masks")
            .field("location", &self.location.as_ref().map(|r| r.name().to_string()))
            .field(
                "by_year",
                &self.by_year.iter().map(|(y, _)| *y).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Ocean-tide correction restricted to floating ice.
pub struct TideCorrection {
    /// Points sampling above 0.5 are floating.
    pub mask: Box<dyn Raster>,
    /// Tide model.
    pub model: Box<dyn CorrectionModel>,
}

/// Correction models applied during assembly. Every entry is optional.
#[derive(Default)]
pub struct Corrections {
    /// Geoid height, needed by the water mask.
    pub geoid: Option<Box<dyn Raster>>,
    /// Tide correction on floating ice.
    pub tide: Option<TideCorrection>,
    /// Firn-air-content model, used when the firn mode is not off.
    pub firn: Option<Box<dyn CorrectionModel>>,
}

impl std::fmt::Debug for Corrections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corrections")
            .field("geoid", &self.geoid.as_ref().map(|r| r.name().to_string()))
            .field("tide", &self.tide.as_ref().map(|t| t.model.name().to_string()))
            .field("firn", &self.firn.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use altifit_core::{Observation, SensorId, TrackMeta};

    fn at(time: f64) -> Observation {
        Observation {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            time,
            sigma: 0.1,
            sigma_corr: 0.0,
            sensor: SensorId(1),
            slope_mag: None,
            track: TrackMeta::default(),
        }
    }

    #[test]
    fn known_bad_epoch_rejects_within_an_hour() {
        let hour = 1.0 / 24.0 / DAYS_PER_YEAR;
        let data = ObservationSet::from_rows(&[
            at(2003.7821),
            at(2003.7821 + 0.05 * hour),
            at(2003.7821 + 0.2 * hour),
            at(2004.0),
        ]);
        assert_eq!(
            KnownBadEpoch::default().keep(&data),
            vec![false, false, true, true]
        );
    }

    #[test]
    fn sample_many_follows_sample() {
        struct Ramp;
        impl Raster for Ramp {
            fn name(&self) -> &str {
                "ramp"
            }
            fn sample(&self, x: f64, y: f64) -> f64 {
                x + 10.0 * y
            }
        }
        assert_eq!(Ramp.sample_many(&[1.0, 2.0], &[0.0, 1.0]), vec![1.0, 12.0]);
    }
}
