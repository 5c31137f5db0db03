//! spotgrid-core — shared types for the spot decision pipeline.
//!
//! Everything that crosses a crate boundary lives here: the evaluation
//! request, candidate pools, decisions and interruption signals, and the
//! TOML pipeline configuration that is validated once and then shared
//! read-only by every stage.

pub mod config;
pub mod error;
pub mod instance;
pub mod types;

pub use config::{
    ActuatorKind, InputKind, PipelineConfig, ProviderSource, RiskModelKind, ValidatedConfig,
};
pub use error::{ConfigError, ValidationError};
pub use types::*;
