//! Finite-difference grids for altifit.
//!
//! This crate defines the coordinate axes shared by the Lagrangian frame
//! and the external surface fit:
//!
//! - [`Grid`]: one evenly spaced axis (x, y, or t) built from bounds and a
//!   spacing, inclusive of the right edge
//! - [`SpatialGrid`]: an (x, y) pair with row-major node enumeration
//! - [`Extent`]: an axis-aligned box used for crop windows, domain tests,
//!   and the running bounds of advected nodes
//! - [`SolvedGrid`]: an `(ny, nx, nt)` result grid as returned by the fit

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod axis;
pub mod error;
pub mod extent;
pub mod solved;
pub mod spatial;

pub use axis::{span_len, Grid};
pub use error::GridError;
pub use extent::Extent;
pub use solved::SolvedGrid;
pub use spatial::SpatialGrid;
