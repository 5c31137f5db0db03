//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by provider calls.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{call} timed out after {timeout_ms}ms")]
    Timeout { call: &'static str, timeout_ms: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected status {status} from {uri}")]
    Status { status: u16, uri: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether a retry could succeed. Missing data stays missing.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::NotFound(_) | ProviderError::Decode(_))
    }
}
