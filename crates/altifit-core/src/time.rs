//! Decimal-year time constants.
//!
//! Observation timestamps are decimal years; velocity epochs are converted
//! to seconds offsets before integration. Both conversions use the Julian
//! year so that they agree with the sensor readers.

/// Days in a Julian year.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Seconds in a Julian year (`24 * 3600 * 365.25`).
pub const SECONDS_PER_YEAR: f64 = 24.0 * 3600.0 * DAYS_PER_YEAR;
