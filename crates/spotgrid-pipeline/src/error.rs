//! Stage and pipeline errors.

use thiserror::Error;

use spotgrid_core::ValidationError;
use spotgrid_providers::ProviderError;

use crate::decision::TransitionError;

/// A stage-local failure. The orchestrator records it in the trace and
/// either restores the last good context or, for safety-critical stages,
/// aborts to the conservative decision.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("provider call {call} failed: {source}")]
    Provider {
        call: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{0}")]
    Failed(String),
}

impl StageError {
    pub fn provider(call: &'static str, source: ProviderError) -> Self {
        Self::Provider { call, source }
    }
}

/// A broken pipeline invariant, detected after the stages ran.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("safety violation: {0}")]
    SafetyViolation(String),
}
