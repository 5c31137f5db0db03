//! Hardware compatibility filter.

use async_trait::async_trait;
use tracing::debug;

use spotgrid_core::{Candidate, ResourceRequirements};

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "hardware_filter";
pub const REASON: &str = "hardware_mismatch";

/// Whether `candidate` can host the workload. Architecture is checked
/// first and admits no partial match.
pub fn check(candidate: &Candidate, req: &ResourceRequirements) -> Result<(), String> {
    if candidate.architecture != req.architecture {
        return Err(format!(
            "{REASON}: architecture {} != {}",
            candidate.architecture, req.architecture
        ));
    }
    if candidate.vcpu < req.vcpu {
        return Err(format!(
            "{REASON}: {} vcpu < {} required",
            candidate.vcpu, req.vcpu
        ));
    }
    if candidate.memory_gib + 1e-9 < req.memory_gib {
        return Err(format!(
            "{REASON}: {} GiB < {} GiB required",
            candidate.memory_gib, req.memory_gib
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct HardwareFilter;

#[async_trait]
impl Stage for HardwareFilter {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::HardwareFilter
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let req = ctx.request.requirements.clone();
        let mut rejected = 0;
        for candidate in ctx.candidates.iter_mut().filter(|c| c.valid) {
            if let Err(reason) = check(candidate, &req) {
                debug!(pool = %candidate.pool_key(), %reason, "rejected");
                candidate.reject(STAGE, reason);
                rejected += 1;
            }
        }
        debug!(rejected, remaining = ctx.valid_count(), "hardware filter applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate, pool_request};
    use spotgrid_core::Architecture;
    use std::time::Duration;

    #[tokio::test]
    async fn rejects_undersized_and_foreign_architectures() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![
            candidate("m5.large", 2, 8.0),
            candidate("c5.large", 2, 2.0),
            candidate("t3.micro", 1, 4.0),
            candidate("m6g.large", 2, 8.0),
        ];
        ctx.candidates[3].architecture = Architecture::Arm64;

        HardwareFilter.process(&mut ctx).await.unwrap();

        assert!(ctx.candidates[0].valid);
        for rejected in &ctx.candidates[1..] {
            let rejection = rejected.rejection.as_ref().unwrap();
            assert_eq!(rejection.stage, STAGE);
            assert!(rejection.reason.starts_with(REASON), "{}", rejection.reason);
        }
        assert!(ctx.candidates[3]
            .rejection
            .as_ref()
            .unwrap()
            .reason
            .contains("architecture"));
    }

    #[tokio::test]
    async fn earlier_rejections_are_kept() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![candidate("t3.micro", 1, 1.0)];
        ctx.candidates[0].reject("input", "price_unavailable");

        HardwareFilter.process(&mut ctx).await.unwrap();
        assert_eq!(ctx.candidates[0].rejection.as_ref().unwrap().stage, "input");
    }
}
