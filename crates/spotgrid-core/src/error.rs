//! Construction-time and request-time error types.

use thiserror::Error;

/// Invalid pipeline setup. Raised while building a pipeline, never while
/// executing one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid stage list: {0}")]
    StageOrder(String),

    #[error("provider setup failed: {0}")]
    Provider(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// A malformed evaluation request. Rejected before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    Missing(&'static str),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("input adapter `{adapter}` cannot serve a {mode} request")]
    ModeMismatch { adapter: String, mode: String },
}
