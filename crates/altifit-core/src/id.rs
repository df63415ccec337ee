//! Strongly-typed sensor identifier.

use std::fmt;

/// Integer code identifying the instrument that produced an observation.
///
/// Codes are drawn from a closed, externally supplied
/// [`SensorDictionary`](crate::SensorDictionary). Laser altimeters use the
/// low codes (1-5); DEM strips are registered above them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId(pub u32);

impl SensorId {
    /// The code as stored in the double-precision `sensor` column.
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Recover a sensor code from a `sensor` column value.
    ///
    /// Returns `None` for non-finite, negative, or fractional values.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX)
        {
            return None;
        }
        Some(Self(value as u32))
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SensorId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
