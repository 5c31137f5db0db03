//! Bounded provider calls.
//!
//! Each attempt runs under `tokio::time::timeout`. A transient failure is
//! retried exactly once after the configured backoff; the second failure
//! is returned to the stage, which then takes its conservative branch.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use spotgrid_core::config::ProvidersConfig;

use crate::error::{ProviderError, ProviderResult};

/// Timeout and retry pause applied to every provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub backoff: Duration,
}

impl CallPolicy {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            timeout: config.timeout(),
            backoff: config.retry_backoff(),
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&ProvidersConfig::default())
    }
}

/// Run `op` with a per-attempt timeout, retrying once on transient errors.
pub async fn call_with_retry<T, F, Fut>(
    policy: CallPolicy,
    call: &'static str,
    mut op: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    match attempt(policy.timeout, call, op()).await {
        Ok(value) => Ok(value),
        Err(e) if !e.is_transient() => Err(e),
        Err(e) => {
            debug!(call, error = %e, backoff_ms = policy.backoff.as_millis() as u64, "provider call failed, retrying once");
            tokio::time::sleep(policy.backoff).await;
            attempt(policy.timeout, call, op()).await
        }
    }
}

async fn attempt<T>(
    timeout: Duration,
    call: &'static str,
    fut: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            call,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
