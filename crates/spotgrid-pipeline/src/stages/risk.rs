//! Risk scoring.
//!
//! Every valid candidate gets a crash probability. A model that errors,
//! times out or answers outside 0.0..=1.0 never fails the stage: the
//! candidate gets the configured fallback probability instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use spotgrid_risk::{RiskFeatures, RiskModel};

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "risk_model";

pub struct RiskStage {
    model: Arc<dyn RiskModel>,
    timeout: Duration,
    fallback: f64,
}

impl RiskStage {
    pub fn new(model: Arc<dyn RiskModel>, timeout: Duration, fallback: f64) -> Self {
        Self {
            model,
            timeout,
            fallback,
        }
    }

    async fn score(&self, features: &RiskFeatures) -> Option<f64> {
        match tokio::time::timeout(self.timeout, self.model.predict(features)).await {
            Ok(Ok(p)) if p.is_finite() => Some(p.clamp(0.0, 1.0)),
            Ok(Ok(p)) => {
                warn!(model = self.model.name(), pool = %features.instance_type, p, "non-finite prediction");
                None
            }
            Ok(Err(e)) => {
                warn!(model = self.model.name(), pool = %features.instance_type, error = %e, "prediction failed");
                None
            }
            Err(_) => {
                warn!(
                    model = self.model.name(),
                    pool = %features.instance_type,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "prediction timed out"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Stage for RiskStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::RiskModel
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let indices = ctx.valid_indices();
        let features: Vec<RiskFeatures> = indices
            .iter()
            .map(|&i| RiskFeatures::from_candidate(&ctx.candidates[i]))
            .collect();

        let scores = join_all(features.iter().map(|f| self.score(f))).await;

        let mut fallbacks = 0;
        for (i, score) in indices.into_iter().zip(scores) {
            let p = score.unwrap_or_else(|| {
                fallbacks += 1;
                self.fallback
            });
            ctx.candidates[i].crash_probability = Some(p);
        }
        if fallbacks > 0 {
            ctx.degrade(format!(
                "{fallbacks} prediction(s) replaced by fallback {}",
                self.fallback
            ));
        }
        debug!(
            model = self.model.name(),
            scored = ctx.scored().count(),
            fallbacks,
            "risk scored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate, pool_request};
    use spotgrid_risk::{ModelResult, MockRiskModel};

    struct SlowModel;

    #[async_trait]
    impl RiskModel for SlowModel {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn predict(&self, _features: &RiskFeatures) -> ModelResult<f64> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(0.0)
        }
    }

    fn context() -> EvaluationContext {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(30));
        ctx.candidates = vec![candidate("c5.large", 2, 4.0), candidate("m5.large", 2, 8.0)];
        ctx.candidates[1].reject("hardware_filter", "hardware_mismatch");
        ctx
    }

    #[tokio::test]
    async fn scores_valid_candidates_only() {
        let model = Arc::new(MockRiskModel::new(0.1).with_override("c5.large", 1.7));
        let mut ctx = context();
        RiskStage::new(model, Duration::from_secs(1), 1.0)
            .process(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.candidates[0].crash_probability, Some(1.0));
        assert_eq!(ctx.candidates[1].crash_probability, None);
    }

    #[tokio::test]
    async fn failures_fall_back() {
        let mut ctx = context();
        RiskStage::new(Arc::new(MockRiskModel::failing()), Duration::from_secs(1), 0.95)
            .process(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.candidates[0].crash_probability, Some(0.95));
        assert_eq!(
            ctx.take_degradation().as_deref(),
            Some("1 prediction(s) replaced by fallback 0.95")
        );
    }

    #[tokio::test]
    async fn timeouts_fall_back() {
        let mut ctx = context();
        RiskStage::new(Arc::new(SlowModel), Duration::from_millis(50), 1.0)
            .process(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.candidates[0].crash_probability, Some(1.0));
    }
}
