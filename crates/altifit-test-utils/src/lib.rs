//! Test utilities and synthetic fixtures for altifit development.
//!
//! - [`fixtures`]: velocity sources with analytic fields (constant,
//!   closure-defined) and helpers that load them into a normalized
//!   [`VelocityField`](altifit_velocity::VelocityField).
//! - [`synthetic`]: seeded observation generators.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod synthetic;

pub use fixtures::{constant_field, ConstantVelocity, FailingVelocity, SyntheticVelocity};
pub use synthetic::{ObservationGenerator, SensorTrack};
