//! Lagrangian reference frame for altimetry fits.
//!
//! Observations collected over many years are advected along the ice
//! velocity field to a common reference epoch before fitting, and the
//! fitted grid nodes are advected forward to every output epoch so the
//! solution can be mapped back to where the ice actually was.
//!
//! The frame moves through its states as owned values:
//!
//! ```text
//! FrameGrids ──load──▶ LagrangianFrame ──advect_grid──▶ GridAdvection
//!                            │
//!                            └──advect_observations──▶ AdvectedObservations
//! ```
//!
//! [`restore_coordinates`] and [`GridAdvection::attach_to`] perform the
//! inverse step once the fit has returned.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod displacement;
pub mod error;
pub mod frame;
pub mod integrator;
pub mod parcel;

pub use config::{FrameGeometry, LagrangianConfig};
pub use displacement::DisplacementField;
pub use error::LagrangianError;
pub use frame::{
    restore_coordinates, AdvectedObservations, DataAdvectionReport, FrameGrids, GridAdvection,
    LagrangianFrame, ReferenceSurface,
};
pub use integrator::ParcelIntegrator;
pub use parcel::{AdvectedParcels, ParcelSet};
