//! Multi-sensor observation fusion and fit orchestration.
//!
//! - [`FusionAssembly`] reads every sensor, applies masks and
//!   corrections in a fixed order, and inflates correlated errors with the
//!   [`SensorErrorModel`]
//! - [`FitPipeline`] runs assembly, the optional Lagrangian frame and an
//!   external [`FitEngine`], then maps the fit back to output epochs
//! - [`ResultLayout`] describes the persisted result file
//!
//! Readers, rasters, correction models and the fit engine are traits
//! implemented by the caller.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod assembly;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod report;
pub mod sensor_error;

pub use assembly::{Assembled, FusionAssembly};
pub use collaborators::{
    CorrectionModel, Corrections, CustomEdit, KnownBadEpoch, Masks, Raster, SensorReader,
    TideCorrection,
};
pub use config::{
    ConfigError, FirnMode, FitConfig, FusionConfig, GridBiasParams, SensorErrorConfig,
    SolverConfig, Spacing,
};
pub use engine::{BiasModelSpec, FitEngine, FitOutput, FitRequest, SensorGridBias, SlopeBias};
pub use error::{EngineError, FusionError, PipelineError};
pub use layout::{AttrValue, Dataset, Group, ResultLayout};
pub use pipeline::{FitPipeline, FitProduct, LagrangianSummary};
pub use report::{FusionReport, StageCount};
pub use sensor_error::{InflationReport, SensorErrorModel};
