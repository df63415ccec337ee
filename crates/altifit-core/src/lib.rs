//! Core types for the altifit workspace.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! column-oriented observation store handed between fusion stages, the
//! sensor identifiers and dictionary, schema errors, and the time
//! constants shared by the advection and error-model crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod observation;
pub mod sensor;
pub mod time;

pub use error::SchemaError;
pub use id::SensorId;
pub use observation::{Observation, ObservationSet, TrackMeta, OPTIONAL_FIELDS, REQUIRED_FIELDS};
pub use sensor::{SensorDictionary, LASER_SENSORS};
pub use time::{DAYS_PER_YEAR, SECONDS_PER_YEAR};
