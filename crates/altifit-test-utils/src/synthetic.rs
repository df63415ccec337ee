//! Seeded synthetic observations.
//!
//! Uses ChaCha8 so fixtures are identical across platforms and runs.

use altifit_core::{ObservationSet, SensorId};
use altifit_grid::Extent;
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters for one simulated sensor.
#[derive(Clone, Debug)]
pub struct SensorTrack {
    pub sensor: SensorId,
    pub count: usize,
    pub t_span: (f64, f64),
    pub sigma: f64,
    pub slope_mag: f64,
}

impl SensorTrack {
    pub fn new(sensor: u32, count: usize, t_span: (f64, f64)) -> Self {
        Self {
            sensor: SensorId(sensor),
            count,
            t_span,
            sigma: 0.1,
            slope_mag: 0.01,
        }
    }

    pub fn with_slope(mut self, slope_mag: f64) -> Self {
        self.slope_mag = slope_mag;
        self
    }
}

/// Generates observations of a planar surface `z = z0 + rate * (t - t0)`
/// scattered uniformly over a box.
pub struct ObservationGenerator {
    rng: ChaCha8Rng,
    extent: Extent,
    z0: f64,
    rate: f64,
    t0: f64,
}

impl ObservationGenerator {
    pub fn new(seed: u64, extent: Extent) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            extent,
            z0: 1000.0,
            rate: -0.5,
            t0: 2000.0,
        }
    }

    /// Surface elevation and its rate of change per year.
    pub fn with_surface(mut self, z0: f64, rate: f64, t0: f64) -> Self {
        self.z0 = z0;
        self.rate = rate;
        self.t0 = t0;
        self
    }

    pub fn surface(&self, t: f64) -> f64 {
        self.z0 + self.rate * (t - self.t0)
    }

    /// Draw a set for one sensor.
    pub fn generate(&mut self, track: &SensorTrack) -> ObservationSet {
        let mut cols: IndexMap<String, Vec<f64>> = IndexMap::new();
        for name in ["x", "y", "z", "time", "sigma", "sigma_corr", "slope_mag", "sensor"] {
            cols.insert(name.to_string(), Vec::with_capacity(track.count));
        }
        for _ in 0..track.count {
            let x = self.extent.x.0 + self.rng.random::<f64>() * self.extent.width();
            let y = self.extent.y.0 + self.rng.random::<f64>() * self.extent.height();
            let t = track.t_span.0 + self.rng.random::<f64>() * (track.t_span.1 - track.t_span.0);
            let noise = (self.rng.random::<f64>() - 0.5) * track.sigma;
            let row = [
                ("x", x),
                ("y", y),
                ("z", self.surface(t) + noise),
                ("time", t),
                ("sigma", track.sigma),
                ("sigma_corr", 0.0),
                ("slope_mag", track.slope_mag),
                ("sensor", track.sensor.as_f64()),
            ];
            for (name, value) in row {
                if let Some(col) = cols.get_mut(name) {
                    col.push(value);
                }
            }
        }
        match ObservationSet::from_columns(cols) {
            Ok(set) => set,
            Err(e) => panic!("synthetic observations: {e}"),
        }
    }
}
