//! Reactive signal override.
//!
//! Runs after every predictive stage and outranks all of them:
//! TERMINATION → EVACUATE, REBALANCE → DRAIN, NONE keeps the predictive
//! decision. Only the running instance is ever checked; pool search has
//! no running instance and records NONE.

use async_trait::async_trait;
use tracing::{debug, warn};

use spotgrid_core::{EvaluationMode, Signal, ValidationError};
use spotgrid_providers::{ProviderSet, call_with_retry};

use crate::context::EvaluationContext;
use crate::decision::resolve_predictive;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "signal_override";

pub struct SignalOverride {
    providers: ProviderSet,
}

impl SignalOverride {
    pub fn new(providers: ProviderSet) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl Stage for SignalOverride {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::SignalOverride
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        resolve_predictive(ctx)?;

        if ctx.request.mode == EvaluationMode::PoolSearch {
            ctx.signal = Signal::None;
            return Ok(());
        }

        let instance_id = ctx
            .request
            .current
            .as_ref()
            .map(|c| c.instance_id.clone())
            .ok_or(ValidationError::Missing("current.instance_id"))?;
        let signals = self.providers.signal.as_ref();
        let id = instance_id.as_str();
        let signal = call_with_retry(self.providers.policy, "check_signal", move || {
            signals.check_signal(id)
        })
        .await
        .map_err(|e| StageError::provider("check_signal", e))?;

        let reason = match signal {
            Signal::None => {
                ctx.signal = Signal::None;
                debug!(%instance_id, "no interruption signal");
                return Ok(());
            }
            Signal::Termination => format!("termination notice for {instance_id}"),
            Signal::Rebalance => format!("rebalance recommendation for {instance_id}"),
        };

        let predicted = ctx.state;
        if ctx.apply_signal(signal) {
            warn!(
                %instance_id,
                %signal,
                predicted = ?predicted,
                decision = ?ctx.state,
                "signal overrides predictive decision"
            );
            ctx.reason = format!("{reason} (overrides {predicted:?}: {})", ctx.reason);
        } else {
            debug!(%instance_id, %signal, decision = ?ctx.state, "decision already terminal");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate, providers, single_request};
    use spotgrid_core::Decision;
    use spotgrid_providers::{MockFault, MockProviders};
    use std::time::Duration;

    async fn run(signal: Signal) -> EvaluationContext {
        let mock = MockProviders::new().with_signal("i-0abc", signal);
        let mut ctx = EvaluationContext::new(single_request(), Duration::from_secs(5));
        ctx.candidates = vec![candidate("c5.large", 2, 4.0).as_current()];
        SignalOverride::new(providers(mock))
            .process(&mut ctx)
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn precedence() {
        assert_eq!(run(Signal::None).await.decision(), Some(Decision::Stay));
        assert_eq!(run(Signal::Rebalance).await.decision(), Some(Decision::Drain));

        let ctx = run(Signal::Termination).await;
        assert_eq!(ctx.decision(), Some(Decision::Evacuate));
        assert_eq!(ctx.signal, Signal::Termination);
        assert!(ctx.reason.starts_with("termination notice for i-0abc"));
    }

    #[tokio::test]
    async fn provider_failure_is_a_stage_error() {
        let mock = MockProviders::new().with_fault(MockFault::Signal);
        let mut ctx = EvaluationContext::new(single_request(), Duration::from_secs(5));
        let err = SignalOverride::new(providers(mock))
            .process(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Provider { call: "check_signal", .. }));
    }
}
