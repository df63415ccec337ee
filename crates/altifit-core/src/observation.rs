//! Column-oriented storage for fused surface-elevation observations.
//!
//! An [`ObservationSet`] is a struct-of-arrays: every column is a `Vec<f64>`
//! of identical length. Readers build sets row by row; later stages add
//! columns (`tide_ocean`, `x_original`, ...), drop rows through boolean
//! masks, and concatenate sets across sensors. Rows are never appended to a
//! set once a stage has started working on it.

use indexmap::IndexMap;

use crate::error::SchemaError;
use crate::id::SensorId;

/// Columns every observation set carries.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "x",
    "y",
    "z",
    "time",
    "sigma",
    "sigma_corr",
    "slope_mag",
    "sensor",
];

/// Track metadata columns, back-filled with NaN when a reader lacks them.
pub const OPTIONAL_FIELDS: [&str; 4] = ["spot", "rgt", "cycle", "BP"];

/// Optional sensor-specific track identifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackMeta {
    /// Reference ground track.
    pub rgt: Option<f64>,
    /// Orbit cycle.
    pub cycle: Option<f64>,
    /// Beam / spot number.
    pub spot: Option<f64>,
    /// Beam pair.
    pub bp: Option<f64>,
}

/// A single surface-elevation measurement, as produced by a reader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// Projected easting (m).
    pub x: f64,
    /// Projected northing (m).
    pub y: f64,
    /// Surface elevation (m).
    pub z: f64,
    /// Timestamp (decimal year).
    pub time: f64,
    /// Random measurement uncertainty (m).
    pub sigma: f64,
    /// Correlated/systematic uncertainty (m).
    pub sigma_corr: f64,
    /// Producing instrument.
    pub sensor: SensorId,
    /// Local surface-slope magnitude, if known.
    pub slope_mag: Option<f64>,
    /// Track identifiers.
    pub track: TrackMeta,
}

/// A homogeneous set of observations stored by column.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSet {
    columns: IndexMap<String, Vec<f64>>,
    len: usize,
}

impl Default for ObservationSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationSet {
    /// Create an empty set carrying every required and optional column.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty set with room for `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut columns = IndexMap::new();
        for name in REQUIRED_FIELDS.iter().chain(OPTIONAL_FIELDS.iter()) {
            columns.insert((*name).to_string(), Vec::with_capacity(capacity));
        }
        Self { columns, len: 0 }
    }

    /// Build a set from observation rows.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let rows = rows.into_iter();
        let mut set = Self::with_capacity(rows.size_hint().0);
        for obs in rows {
            set.push_row(obs);
        }
        set
    }

    /// Build a set from named columns.
    ///
    /// Every [`REQUIRED_FIELDS`] column must be present; missing
    /// [`OPTIONAL_FIELDS`] are back-filled with NaN.
    pub fn from_columns(columns: IndexMap<String, Vec<f64>>) -> Result<Self, SchemaError> {
        for name in REQUIRED_FIELDS {
            if !columns.contains_key(name) {
                return Err(SchemaError::MissingField {
                    name: name.to_string(),
                });
            }
        }
        let len = columns.get("x").map_or(0, Vec::len);
        for (name, col) in &columns {
            if col.len() != len {
                return Err(SchemaError::LengthMismatch {
                    field: name.clone(),
                    expected: len,
                    found: col.len(),
                });
            }
        }
        let mut set = Self { columns, len };
        for name in OPTIONAL_FIELDS {
            if !set.columns.contains_key(name) {
                set.columns.insert(name.to_string(), vec![f64::NAN; len]);
            }
        }
        Ok(set)
    }

    fn push_row(&mut self, obs: &Observation) {
        let values = [
            ("x", obs.x),
            ("y", obs.y),
            ("z", obs.z),
            ("time", obs.time),
            ("sigma", obs.sigma),
            ("sigma_corr", obs.sigma_corr),
            ("slope_mag", obs.slope_mag.unwrap_or(f64::NAN)),
            ("sensor", obs.sensor.as_f64()),
            ("spot", obs.track.spot.unwrap_or(f64::NAN)),
            ("rgt", obs.track.rgt.unwrap_or(f64::NAN)),
            ("cycle", obs.track.cycle.unwrap_or(f64::NAN)),
            ("BP", obs.track.bp.unwrap_or(f64::NAN)),
        ];
        for (name, value) in values {
            self.columns.entry(name.to_string()).or_default().push(value);
        }
        self.len += 1;
        // Extra columns assigned earlier keep the schema uniform.
        for col in self.columns.values_mut() {
            if col.len() < self.len {
                col.push(f64::NAN);
            }
        }
    }

    /// Concatenate sets across sensors.
    ///
    /// The result carries the union of all column names; a set lacking a
    /// column contributes NaN rows to it.
    pub fn concat<I>(sets: I) -> Self
    where
        I: IntoIterator<Item = ObservationSet>,
    {
        let sets: Vec<ObservationSet> = sets.into_iter().collect();
        let total: usize = sets.iter().map(|s| s.len).sum();
        let mut out = Self::with_capacity(total);
        for set in &sets {
            for name in set.columns.keys() {
                if !out.columns.contains_key(name) {
                    out.columns.insert(name.clone(), Vec::with_capacity(total));
                }
            }
        }
        for set in sets {
            for (name, col) in out.columns.iter_mut() {
                match set.columns.get(name) {
                    Some(src) => col.extend_from_slice(src),
                    None => col.extend(std::iter::repeat_n(f64::NAN, set.len)),
                }
            }
            out.len += set.len;
        }
        out
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set has no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Column names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Whether a column exists.
    pub fn contains_field(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Read a column.
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Mutably borrow a column.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        self.columns.get_mut(name).map(Vec::as_mut_slice)
    }

    /// Iterate `(name, column)` pairs in schema order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn required(&self, name: &str) -> &[f64] {
        match self.columns.get(name) {
            Some(col) => col.as_slice(),
            None => &[],
        }
    }

    fn required_mut(&mut self, name: &str) -> &mut [f64] {
        match self.columns.get_mut(name) {
            Some(col) => col.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Easting column.
    pub fn x(&self) -> &[f64] {
        self.required("x")
    }

    /// Northing column.
    pub fn y(&self) -> &[f64] {
        self.required("y")
    }

    /// Mutable easting column.
    pub fn x_mut(&mut self) -> &mut [f64] {
        self.required_mut("x")
    }

    /// Mutable northing column.
    pub fn y_mut(&mut self) -> &mut [f64] {
        self.required_mut("y")
    }

    /// Elevation column.
    pub fn z(&self) -> &[f64] {
        self.required("z")
    }

    /// Mutable elevation column.
    pub fn z_mut(&mut self) -> &mut [f64] {
        self.required_mut("z")
    }

    /// Timestamp column (decimal years).
    pub fn time(&self) -> &[f64] {
        self.required("time")
    }

    /// Random-error column.
    pub fn sigma(&self) -> &[f64] {
        self.required("sigma")
    }

    /// Mutable random-error column.
    pub fn sigma_mut(&mut self) -> &mut [f64] {
        self.required_mut("sigma")
    }

    /// Correlated-error column.
    pub fn sigma_corr(&self) -> &[f64] {
        self.required("sigma_corr")
    }

    /// Mutable correlated-error column.
    pub fn sigma_corr_mut(&mut self) -> &mut [f64] {
        self.required_mut("sigma_corr")
    }

    /// Slope-magnitude column (NaN where unknown).
    pub fn slope_mag(&self) -> &[f64] {
        self.required("slope_mag")
    }

    /// Raw sensor column.
    pub fn sensor(&self) -> &[f64] {
        self.required("sensor")
    }

    /// Sensor code of row `i`.
    pub fn sensor_at(&self, i: usize) -> Option<SensorId> {
        self.sensor().get(i).copied().and_then(SensorId::from_f64)
    }

    /// Insert or replace a column.
    pub fn assign(&mut self, name: &str, values: Vec<f64>) -> Result<(), SchemaError> {
        if values.len() != self.len {
            return Err(SchemaError::LengthMismatch {
                field: name.to_string(),
                expected: self.len,
                found: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Remove a non-required column and return its values.
    pub fn remove_field(&mut self, name: &str) -> Result<Vec<f64>, SchemaError> {
        if REQUIRED_FIELDS.contains(&name) {
            return Err(SchemaError::RequiredField {
                name: name.to_string(),
            });
        }
        self.columns
            .shift_remove(name)
            .ok_or_else(|| SchemaError::MissingField {
                name: name.to_string(),
            })
    }

    /// Keep only rows whose mask entry is `true`; returns the number dropped.
    pub fn retain(&mut self, keep: &[bool]) -> Result<usize, SchemaError> {
        if keep.len() != self.len {
            return Err(SchemaError::MaskLength {
                expected: self.len,
                found: keep.len(),
            });
        }
        for col in self.columns.values_mut() {
            let mut i = 0;
            col.retain(|_| {
                let k = keep[i];
                i += 1;
                k
            });
        }
        let kept = keep.iter().filter(|&&k| k).count();
        let dropped = self.len - kept;
        self.len = kept;
        Ok(dropped)
    }

    /// Row view of observation `i`.
    pub fn row(&self, i: usize) -> Option<Observation> {
        if i >= self.len {
            return None;
        }
        let opt = |name: &str| {
            self.field(name)
                .and_then(|c| c.get(i).copied())
                .filter(|v| v.is_finite())
        };
        Some(Observation {
            x: self.x()[i],
            y: self.y()[i],
            z: self.z()[i],
            time: self.time()[i],
            sigma: self.sigma()[i],
            sigma_corr: self.sigma_corr()[i],
            sensor: self.sensor_at(i)?,
            slope_mag: opt("slope_mag"),
            track: TrackMeta {
                rgt: opt("rgt"),
                cycle: opt("cycle"),
                spot: opt("spot"),
                bp: opt("BP"),
            },
        })
    }

    /// Row counts per sensor, in order of first appearance.
    pub fn count_by_sensor(&self) -> IndexMap<SensorId, usize> {
        let mut counts = IndexMap::new();
        for i in 0..self.len {
            if let Some(id) = self.sensor_at(i) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
    }
}
