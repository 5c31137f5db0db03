//! Safety gate.
//!
//! The one filter price cannot buy past: any candidate whose crash
//! probability exceeds the ceiling is rejected here, after scoring and
//! before ranking. With the risk stage enabled, a valid candidate without
//! a score is unknown risk and is rejected too.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "safety_gate";
pub const REASON: &str = "crash_probability_exceeded";
pub const UNKNOWN: &str = "risk_unknown";

pub struct SafetyGate {
    max_crash_probability: f64,
    require_score: bool,
}

impl SafetyGate {
    pub fn new(max_crash_probability: f64, require_score: bool) -> Self {
        Self {
            max_crash_probability,
            require_score,
        }
    }
}

#[async_trait]
impl Stage for SafetyGate {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::SafetyGate
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        if !(0.0..=1.0).contains(&self.max_crash_probability) {
            return Err(StageError::Failed(format!(
                "crash ceiling {} outside 0.0..=1.0",
                self.max_crash_probability
            )));
        }

        let max = self.max_crash_probability;
        let mut rejected = 0;
        for candidate in ctx.candidates.iter_mut().filter(|c| c.valid) {
            let reason = match candidate.crash_probability {
                Some(p) if p > max => format!("{REASON}: {p:.3} > {max:.3}"),
                None if self.require_score => UNKNOWN.to_string(),
                _ => continue,
            };
            info!(pool = %candidate.pool_key(), current = candidate.is_current, %reason, "blocked by safety gate");
            candidate.reject(STAGE, reason);
            rejected += 1;
        }
        ctx.gate_applied = true;
        debug!(rejected, remaining = ctx.valid_count(), "safety gate applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate, pool_request};
    use std::time::Duration;

    #[tokio::test]
    async fn rejects_above_ceiling_and_unscored() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![
            candidate("c5.large", 2, 4.0),
            candidate("m5.large", 2, 8.0),
            candidate("r5.large", 2, 16.0),
            candidate("t3.large", 2, 8.0),
        ];
        ctx.candidates[0].crash_probability = Some(0.90);
        ctx.candidates[1].crash_probability = Some(0.85);
        ctx.candidates[2].crash_probability = None;
        ctx.candidates[3].crash_probability = Some(0.1);

        SafetyGate::new(0.85, true).process(&mut ctx).await.unwrap();

        assert!(ctx.gate_applied);
        assert!(!ctx.candidates[0].valid);
        assert!(ctx.candidates[1].valid, "the ceiling itself is allowed");
        assert_eq!(ctx.candidates[2].rejection.as_ref().unwrap().reason, UNKNOWN);
        assert!(ctx.candidates[3].valid);
    }

    #[tokio::test]
    async fn unscored_passes_without_risk_stage() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![candidate("c5.large", 2, 4.0)];
        SafetyGate::new(0.85, false).process(&mut ctx).await.unwrap();
        assert!(ctx.candidates[0].valid);
    }
}
