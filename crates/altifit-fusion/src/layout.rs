//! In-memory description of the persisted fit file.
//!
//! The on-disk container is hierarchical: groups hold attributes,
//! datasets and child groups. [`ResultLayout`] builds that tree from a
//! [`FitProduct`] so a writer for any container format (or a JSON dump)
//! only has to walk it. A layout read back from a previous run hands its
//! observations and sensors to [`FitPipeline::resume`](crate::FitPipeline::resume).

use altifit_core::{ObservationSet, SchemaError, SensorDictionary};
use altifit_grid::SolvedGrid;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::SlopeBias;
use crate::pipeline::FitProduct;

/// Scalar attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Text attribute.
    Text(String),
    /// Numeric attribute.
    Number(f64),
}

/// An n-dimensional `f64` array, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Dimension lengths; empty for a scalar.
    pub shape: Vec<usize>,
    /// Values. Non-finite entries render as JSON `null` and read back as
    /// NaN.
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
}

impl Dataset {
    fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }
}

/// A node of the container tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Attributes.
    pub attrs: IndexMap<String, AttrValue>,
    /// Datasets.
    pub datasets: IndexMap<String, Dataset>,
    /// Child groups.
    pub groups: IndexMap<String, Group>,
}

impl Group {
    fn entry(&mut self, path: &str) -> &mut Group {
        path.split('/')
            .filter(|p| !p.is_empty())
            .fold(self, |g, name| g.groups.entry(name.to_string()).or_default())
    }

    fn get(&self, path: &str) -> Option<&Group> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(self, |g, name| g.groups.get(name))
    }
}

/// Layout of one fit file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultLayout {
    root: Group,
}

impl ResultLayout {
    /// Build the layout of `product`.
    pub fn from_product(product: &FitProduct) -> Self {
        let mut root = Group::default();
        let out = &product.output;

        let data = root.entry("/data");
        for (name, col) in out.data.columns() {
            data.datasets
                .insert(name.to_string(), Dataset::vector(col.to_vec()));
        }

        let meta = root.entry("/meta");
        meta.attrs.insert(
            "reference_epoch".to_string(),
            AttrValue::Number(product.reference_epoch as f64),
        );
        let timing = root.entry("/meta/timing");
        for (key, secs) in &out.timing {
            timing.attrs.insert(key.clone(), AttrValue::Number(*secs));
        }
        let sensors = root.entry("/meta/sensors");
        for (key, name) in product.sensors.to_attrs() {
            sensors.attrs.insert(key, AttrValue::Text(name));
        }

        for (path, values) in [("/RMS", &out.rms), ("/E_RMS", &out.e_rms)] {
            let group = root.entry(path);
            for (key, v) in values {
                group.datasets.insert(key.clone(), Dataset::scalar(*v));
            }
        }
        if !out.bias.is_empty() {
            let bias = root.entry("/bias");
            for (key, v) in &out.bias {
                bias.datasets.insert(key.clone(), Dataset::vector(v.clone()));
            }
        }
        if !out.slope_bias.is_empty() {
            let slope = root.entry("/slope_bias");
            let column = |f: fn(&SlopeBias) -> f64| {
                Dataset::vector(out.slope_bias.values().map(f).collect())
            };
            slope.datasets.insert(
                "sensors".to_string(),
                Dataset::vector(out.slope_bias.keys().map(|id| id.as_f64()).collect()),
            );
            slope.datasets.insert("x_slope".to_string(), column(|b| b.x));
            slope.datasets.insert("y_slope".to_string(), column(|b| b.y));
        }

        for (name, grid) in &out.grids {
            write_grid(root.entry(name), name, grid, true);
        }
        for (name, grid) in &out.grid_bias {
            write_grid(root.entry(&grid_bias_path(name)), name, grid, false);
        }
        for (name, grid) in &out.errors {
            let path = if out.grid_bias.contains_key(name) {
                grid_bias_path(name)
            } else {
                name.clone()
            };
            write_grid(root.entry(&path), &format!("sigma_{name}"), grid, false);
        }
        Self { root }
    }

    /// Parse a layout from its [`to_json`](Self::to_json) rendering.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Group at a `/`-separated path.
    pub fn group(&self, path: &str) -> Option<&Group> {
        self.root.get(path)
    }

    /// Dataset at a `/`-separated path.
    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
        self.group(parent)?.datasets.get(name)
    }

    /// Sensor dictionary recovered from the `/meta/sensors` attributes.
    pub fn sensors(&self) -> SensorDictionary {
        let Some(group) = self.group("/meta/sensors") else {
            return SensorDictionary::new();
        };
        SensorDictionary::from_attrs(group.attrs.iter().filter_map(|(k, v)| match v {
            AttrValue::Text(name) => Some((k.as_str(), name.as_str())),
            AttrValue::Number(_) => None,
        }))
    }

    /// The observations stored under `/data`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::MissingField`] when a required column is absent,
    /// [`SchemaError::LengthMismatch`] when columns disagree in length.
    pub fn observations(&self) -> Result<ObservationSet, SchemaError> {
        let columns: IndexMap<String, Vec<f64>> = self
            .group("/data")
            .map(|data| {
                data.datasets
                    .iter()
                    .map(|(name, d)| (name.clone(), d.values.clone()))
                    .collect()
            })
            .unwrap_or_default();
        ObservationSet::from_columns(columns)
    }

    /// Pretty JSON rendering of the tree.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.root)
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

fn grid_bias_path(name: &str) -> String {
    format!("/grid_bias/{name}")
}

fn write_grid(group: &mut Group, field: &str, grid: &SolvedGrid, displacement: bool) {
    let (ny, nx, nt) = grid.shape();
    let shape = if grid.t.is_some() {
        vec![ny, nx, nt]
    } else {
        vec![ny, nx]
    };
    group
        .datasets
        .entry("x".to_string())
        .or_insert_with(|| Dataset::vector(grid.x.clone()));
    group
        .datasets
        .entry("y".to_string())
        .or_insert_with(|| Dataset::vector(grid.y.clone()));
    if let Some(t) = &grid.t {
        group
            .datasets
            .entry("t".to_string())
            .or_insert_with(|| Dataset::vector(t.clone()));
    }
    group.datasets.insert(
        field.to_string(),
        Dataset {
            shape: shape.clone(),
            values: grid.values.clone(),
        },
    );
    if !displacement {
        return;
    }
    if let (Some(dx), Some(dy)) = (&grid.dx, &grid.dy) {
        group.datasets.insert(
            "dx".to_string(),
            Dataset {
                shape: shape.clone(),
                values: dx.clone(),
            },
        );
        group.datasets.insert(
            "dy".to_string(),
            Dataset {
                shape,
                values: dy.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FitOutput;
    use crate::report::FusionReport;
    use altifit_core::{Observation, ObservationSet, SensorId, TrackMeta};

    fn product(lagrangian: bool) -> FitProduct {
        let data = ObservationSet::from_rows(&[Observation {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            time: 2010.0,
            sigma: 0.1,
            sigma_corr: 0.2,
            sensor: SensorId(2),
            slope_mag: None,
            track: TrackMeta::default(),
        }]);
        let mut output = FitOutput {
            data,
            ..Default::default()
        };
        let mut dz = SolvedGrid::filled(vec![0.0, 1.0], vec![0.0, 1.0, 2.0], Some(vec![2010.0, 2011.0]), 0.5);
        if lagrangian {
            dz.dx = Some(vec![1.0; 12]);
            dz.dy = Some(vec![-1.0; 12]);
        }
        output.grids.insert("z0".into(), SolvedGrid::filled(vec![0.0, 1.0], vec![0.0, 1.0, 2.0], None, 100.0));
        output.grids.insert("dz".into(), dz.clone());
        output.errors.insert("dz".into(), dz);
        output.rms.insert("data".into(), 0.4);
        output.e_rms.insert("d2z_dt2".into(), 5000.0);
        output.timing.insert("solve".into(), 1.5);
        let mut sensors = SensorDictionary::with_laser_defaults();
        sensors.register("WV02_20140101");
        FitProduct {
            output,
            sensors,
            fusion: FusionReport::default(),
            lagrangian: None,
            reference_epoch: 34,
        }
    }

    #[test]
    fn layout_holds_data_meta_and_grids() {
        let layout = ResultLayout::from_product(&product(false));
        assert_eq!(layout.dataset("/data/z").unwrap().values, vec![3.0]);
        assert!(layout.dataset("/data/BP").is_some());
        assert_eq!(layout.dataset("/RMS/data").unwrap().shape, Vec::<usize>::new());
        assert_eq!(layout.dataset("/E_RMS/d2z_dt2").unwrap().values, vec![5000.0]);
        assert_eq!(
            layout.group("/meta/timing").unwrap().attrs["solve"],
            AttrValue::Number(1.5)
        );
        assert_eq!(layout.dataset("/z0/z0").unwrap().shape, vec![3, 2]);
        assert_eq!(layout.dataset("/dz/dz").unwrap().shape, vec![3, 2, 2]);
        assert_eq!(layout.dataset("/dz/t").unwrap().values, vec![2010.0, 2011.0]);
        assert!(layout.dataset("/dz/sigma_dz").is_some());
        assert!(layout.dataset("/dz/dx").is_none());
        assert!(layout.group("/bias").is_none());
    }

    #[test]
    fn displacement_only_for_lagrangian_runs() {
        let layout = ResultLayout::from_product(&product(true));
        assert_eq!(layout.dataset("/dz/dx").unwrap().shape, vec![3, 2, 2]);
        assert_eq!(layout.dataset("/dz/dy").unwrap().values[0], -1.0);
        assert!(layout.dataset("/z0/dx").is_none());
    }

    #[test]
    fn sensors_round_trip_through_attrs() {
        let p = product(false);
        let layout = ResultLayout::from_product(&p);
        assert_eq!(layout.sensors(), p.sensors);
        assert_eq!(
            layout.group("/meta/sensors").unwrap().attrs["sensor_6"],
            AttrValue::Text("WV02_20140101".into())
        );
    }

    #[test]
    fn slope_and_grid_biases_get_their_own_groups() {
        let mut p = product(false);
        let out = &mut p.output;
        out.slope_bias.insert(SensorId(6), SlopeBias { x: 1e-4, y: -2e-4 });
        out.slope_bias.insert(SensorId(7), SlopeBias { x: 0.0, y: 3e-4 });
        let bias = SolvedGrid::filled(vec![0.0, 10.0], vec![0.0, 10.0], None, 0.25);
        out.grid_bias.insert("sensor_6_bias".into(), bias.clone());
        out.errors.insert("sensor_6_bias".into(), bias);
        let layout = ResultLayout::from_product(&p);

        assert_eq!(layout.dataset("/slope_bias/sensors").unwrap().values, vec![6.0, 7.0]);
        assert_eq!(layout.dataset("/slope_bias/x_slope").unwrap().values, vec![1e-4, 0.0]);
        assert_eq!(layout.dataset("/slope_bias/y_slope").unwrap().values, vec![-2e-4, 3e-4]);
        let grid = layout.group("/grid_bias/sensor_6_bias").unwrap();
        assert_eq!(grid.datasets["sensor_6_bias"].shape, vec![2, 2]);
        assert_eq!(grid.datasets["sigma_sensor_6_bias"].values, vec![0.25; 4]);
        assert!(layout.group("/sensor_6_bias").is_none());
        // Ordinary error grids stay beside their grid.
        assert!(layout.dataset("/dz/sigma_dz").is_some());
    }

    #[test]
    fn bias_groups_are_absent_without_biases() {
        let layout = ResultLayout::from_product(&product(false));
        assert!(layout.group("/slope_bias").is_none());
        assert!(layout.group("/grid_bias").is_none());
    }

    #[test]
    fn observations_come_back_from_a_parsed_layout() {
        let p = product(false);
        let json = ResultLayout::from_product(&p).to_json().unwrap();
        let layout = ResultLayout::from_json(&json).unwrap();
        let data = layout.observations().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.z(), &[3.0]);
        assert_eq!(data.sensor_at(0), Some(SensorId(2)));
        assert!(data.slope_mag()[0].is_nan());
        assert_eq!(layout.sensors(), p.sensors);

        assert_eq!(
            ResultLayout::default().observations(),
            Err(SchemaError::MissingField { name: "x".into() })
        );
    }

    #[test]
    fn renders_json() {
        let json = ResultLayout::from_product(&product(false)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["groups"]["meta"]["attrs"]["reference_epoch"], 34.0);
        assert_eq!(value["groups"]["meta"]["groups"]["sensors"]["attrs"]["sensor_1"], "ICESat1");
    }
}
