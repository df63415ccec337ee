//! The run-wide sensor dictionary.
//!
//! Built once while the per-sensor readers are assembled (or recovered from
//! the `/meta/sensors` attributes of a previous fit), then treated as
//! immutable and persisted alongside the fit output for provenance.

use indexmap::IndexMap;

use crate::id::SensorId;

/// Laser altimeters and their fixed sensor codes.
pub const LASER_SENSORS: [(&str, u32); 5] = [
    ("ICESat1", 1),
    ("ICESat2", 2),
    ("ATM", 3),
    ("LVIS", 4),
    ("riegl", 5),
];

const ATTR_PREFIX: &str = "sensor_";

/// Mapping from [`SensorId`] to a human-readable sensor name.
///
/// Iteration follows insertion order so that persisted attributes and
/// per-sensor reports are stable between runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SensorDictionary {
    entries: IndexMap<SensorId, String>,
}

impl SensorDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary pre-populated with the [`LASER_SENSORS`].
    pub fn with_laser_defaults() -> Self {
        let mut dict = Self::new();
        for (name, code) in LASER_SENSORS {
            dict.insert(SensorId(code), name);
        }
        dict
    }

    /// Insert or replace an entry, returning the previous name if any.
    pub fn insert(&mut self, id: SensorId, name: impl Into<String>) -> Option<String> {
        self.entries.insert(id, name.into())
    }

    /// Register a sensor by name.
    ///
    /// Returns the existing code if the name is already present, otherwise
    /// allocates the next code above every code in the dictionary (and
    /// above the laser range).
    pub fn register(&mut self, name: &str) -> SensorId {
        if let Some((id, _)) = self.entries.iter().find(|(_, n)| n.as_str() == name) {
            return *id;
        }
        let laser_max = LASER_SENSORS.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let next = self
            .entries
            .keys()
            .map(|id| id.0)
            .max()
            .unwrap_or(0)
            .max(laser_max)
            + 1;
        let id = SensorId(next);
        self.entries.insert(id, name.to_string());
        id
    }

    /// Look up a sensor name.
    pub fn get(&self, id: SensorId) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Whether the dictionary has an entry for `id`.
    pub fn contains(&self, id: SensorId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(id, name)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SensorId, &str)> {
        self.entries.iter().map(|(id, name)| (*id, name.as_str()))
    }

    /// Whether `id` is one of the laser altimeters.
    pub fn is_laser(id: SensorId) -> bool {
        LASER_SENSORS.iter().any(|(_, code)| *code == id.0)
    }

    /// Codes in the dictionary that are not laser altimeters (DEM strips).
    pub fn dem_sensors(&self) -> Vec<SensorId> {
        self.entries
            .keys()
            .copied()
            .filter(|id| !Self::is_laser(*id))
            .collect()
    }

    /// Attribute key under which a sensor is persisted (`sensor_<id>`).
    pub fn attr_key(id: SensorId) -> String {
        format!("{ATTR_PREFIX}{}", id.0)
    }

    /// Attribute pairs for the `/meta/sensors` group.
    pub fn to_attrs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(id, name)| (Self::attr_key(*id), name.clone()))
            .collect()
    }

    /// Recover a dictionary from `/meta/sensors` attributes.
    ///
    /// Keys that do not contain `sensor_<digits>` are ignored.
    pub fn from_attrs<'a, I>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut dict = Self::new();
        for (key, name) in attrs {
            if let Some(code) = parse_attr_key(key) {
                dict.insert(SensorId(code), name);
            }
        }
        dict
    }
}

fn parse_attr_key(key: &str) -> Option<u32> {
    let start = key.find(ATTR_PREFIX)? + ATTR_PREFIX.len();
    let digits: &str = {
        let rest = &key[start..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        &rest[..end]
    };
    digits.parse().ok()
}
