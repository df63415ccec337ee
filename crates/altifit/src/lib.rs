//! altifit: Lagrangian multi-sensor altimetry fusion.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all altifit sub-crates. For most users, adding `altifit` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use altifit::prelude::*;
//!
//! // Output epochs of a default tile: 2003 to 2020 every half year.
//! let t = Grid::new("t", (2003.0, 2020.0), 0.5).unwrap();
//! assert_eq!(t.len(), 35);
//!
//! let config = FitConfig::from_json(r#"{
//!     "center": [-1550000, -450000],
//!     "lagrangian": {"epoch": 2015.0}
//! }"#).unwrap();
//! let pipeline = FitPipeline::new(config).unwrap();
//! assert_eq!(pipeline.reference_epoch(), 34);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `altifit-core` | Observations, sensor ids and dictionary, time constants |
//! | [`grid`] | `altifit-grid` | Finite-difference axes, extents, solved grids |
//! | [`velocity`] | `altifit-velocity` | Velocity ingestion, gap filling, interpolation |
//! | [`advect`] | `altifit-advect` | Parcel integration and the Lagrangian frame |
//! | [`fusion`] | `altifit-fusion` | Assembly, error model, fit pipeline, result layout |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`altifit-core`).
///
/// The column store [`types::ObservationSet`], [`types::SensorId`] and the
/// run-wide [`types::SensorDictionary`].
pub use altifit_core as types;

/// Grid construction (`altifit-grid`).
pub use altifit_grid as grid;

/// Velocity fields (`altifit-velocity`).
///
/// Implement [`velocity::VelocitySource`] to feed a velocity product in.
pub use altifit_velocity as velocity;

/// The Lagrangian frame (`altifit-advect`).
pub use altifit_advect as advect;

/// Fusion and orchestration (`altifit-fusion`).
///
/// [`fusion::FitPipeline`] is the entry point for a full tile.
pub use altifit_fusion as fusion;

/// Common imports for typical altifit usage.
///
/// ```rust
/// use altifit::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use altifit_core::{Observation, ObservationSet, SensorDictionary, SensorId, SECONDS_PER_YEAR};

    // Grids
    pub use altifit_grid::{Extent, Grid, SolvedGrid, SpatialGrid};

    // Velocity
    pub use altifit_velocity::{
        InterpolationScheme, SamplingDensity, VelocityField, VelocityIngest, VelocityProduct,
        VelocitySource,
    };

    // Lagrangian frame
    pub use altifit_advect::{FrameGrids, LagrangianConfig, LagrangianFrame, ReferenceSurface};

    // Fusion and pipeline
    pub use altifit_fusion::{
        CorrectionModel, Corrections, CustomEdit, FitConfig, FitEngine, FitOutput, FitPipeline,
        FitProduct, FitRequest, Masks, Raster, ResultLayout, SensorReader,
    };

    // Errors
    pub use altifit_advect::LagrangianError;
    pub use altifit_fusion::{ConfigError, EngineError, FusionError, PipelineError};
    pub use altifit_velocity::VelocityError;
}
