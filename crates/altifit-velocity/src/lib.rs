//! Ice-velocity fields for Lagrangian advection.
//!
//! A [`VelocityField`] is assembled from one or more [`VelocitySource`]
//! products, normalized to ascending axes, optionally cropped to the fit
//! domain plus a buffer, gap-filled once, and then sampled read-only by the
//! parcel integrator.
//!
//! The interpolation scheme is fixed when the field is loaded:
//! single dense products use Catmull-Rom bicubic sampling, sparse series
//! and multi-file composites use bilinear sampling.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod gap_fill;
pub mod interp;
pub mod source;

pub use error::VelocityError;
pub use field::{CropWindow, TimeBase, VelocityField};
pub use gap_fill::GapFillReport;
pub use interp::InterpolationScheme;
pub use source::{SamplingDensity, VelocityIngest, VelocityProduct, VelocitySource};
