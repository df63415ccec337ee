//! Error types for fusion and the fit pipeline.

use std::error::Error;
use std::fmt;

use altifit_advect::LagrangianError;
use altifit_core::SchemaError;
use altifit_grid::GridError;

use crate::config::ConfigError;

/// Errors raised while assembling the fused observation set.
#[derive(Debug, Clone, PartialEq)]
pub enum FusionError {
    /// Column bookkeeping failed.
    Schema(SchemaError),
    /// A bias-model grid could not be built.
    Grid(GridError),
    /// A sensor reader failed.
    Reader {
        /// Reader name.
        name: String,
        /// Reader-supplied reason.
        reason: String,
    },
    /// A correction model failed or returned the wrong number of values.
    Correction {
        /// Model name.
        name: String,
        /// What went wrong.
        reason: String,
    },
    /// A step was enabled without the collaborator it needs.
    MissingCollaborator {
        /// Which collaborator.
        what: &'static str,
    },
}

impl fmt::Display for FusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(e) => write!(f, "schema: {e}"),
            Self::Grid(e) => write!(f, "grid: {e}"),
            Self::Reader { name, reason } => write!(f, "reader '{name}' failed: {reason}"),
            Self::Correction { name, reason } => {
                write!(f, "correction '{name}' failed: {reason}")
            }
            Self::MissingCollaborator { what } => {
                write!(f, "step enabled but no {what} was supplied")
            }
        }
    }
}

impl Error for FusionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(e) => Some(e),
            Self::Grid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for FusionError {
    fn from(e: GridError) -> Self {
        Self::Grid(e)
    }
}

impl From<SchemaError> for FusionError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

/// Failure reported by the external fit engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Engine-supplied reason.
    pub reason: String,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fit engine failed: {}", self.reason)
    }
}

impl Error for EngineError {}

/// Errors that abort a [`FitPipeline`](crate::FitPipeline) run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Configuration did not validate.
    Config(ConfigError),
    /// Observation assembly failed.
    Fusion(FusionError),
    /// The Lagrangian frame failed.
    Lagrangian(LagrangianError),
    /// The fit engine failed.
    Engine(EngineError),
    /// No observations survived assembly.
    NoData,
    /// The fit output lacks a grid the pipeline needs.
    MissingGrid {
        /// Grid name.
        name: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Fusion(e) => write!(f, "fusion: {e}"),
            Self::Lagrangian(e) => write!(f, "lagrangian: {e}"),
            Self::Engine(e) => write!(f, "{e}"),
            Self::NoData => write!(f, "no observations left to fit"),
            Self::MissingGrid { name } => write!(f, "fit output has no '{name}' grid"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Fusion(e) => Some(e),
            Self::Lagrangian(e) => Some(e),
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<FusionError> for PipelineError {
    fn from(e: FusionError) -> Self {
        Self::Fusion(e)
    }
}

impl From<LagrangianError> for PipelineError {
    fn from(e: LagrangianError) -> Self {
        Self::Lagrangian(e)
    }
}

impl From<EngineError> for PipelineError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<SchemaError> for PipelineError {
    fn from(e: SchemaError) -> Self {
        Self::Fusion(FusionError::Schema(e))
    }
}
