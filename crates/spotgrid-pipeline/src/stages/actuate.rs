//! Terminal stage: hand the decision to the actuator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::actuator::{ActuationReport, ActuationRequest, Actuator};
use crate::context::EvaluationContext;
use crate::decision::conservative_decision;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "actuator";

pub struct ActuatorStage {
    actuator: Arc<dyn Actuator>,
}

impl ActuatorStage {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }
}

#[async_trait]
impl Stage for ActuatorStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::Actuator
    }

    /// Never fails: actuator errors are reported next to the decision.
    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let decision = ctx
            .decision()
            .unwrap_or_else(|| conservative_decision(ctx.request.mode));
        let request = ActuationRequest {
            decision,
            reason: ctx.reason.clone(),
            mode: ctx.request.mode,
            signal: ctx.signal,
            instance_id: ctx.request.current.as_ref().map(|c| c.instance_id.clone()),
            target: ctx.selected_candidate().map(|c| c.pool_key()),
            recommendations: ctx
                .recommendations
                .iter()
                .filter_map(|&i| ctx.candidates.get(i))
                .map(|c| c.pool_key())
                .collect(),
        };

        let error = match self.actuator.apply(&request).await {
            Ok(()) => None,
            Err(e) => {
                warn!(actuator = self.actuator.name(), %decision, error = %e, "actuation failed");
                Some(e.to_string())
            }
        };
        ctx.actuation = Some(ActuationReport {
            actuator: self.actuator.name(),
            decision,
            error,
        });
        Ok(())
    }
}
