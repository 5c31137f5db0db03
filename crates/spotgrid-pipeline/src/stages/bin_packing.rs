//! Bin-packing waste cost for rightsized candidates.

use async_trait::async_trait;
use tracing::debug;

use spotgrid_core::{Candidate, Fit, ResourceRequirements};

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "bin_packing";

pub struct BinPacking {
    waste_weight: f64,
}

impl BinPacking {
    pub fn new(waste_weight: f64) -> Self {
        Self { waste_weight }
    }
}

/// `weight · (unused_vcpu / vcpu + unused_memory / memory) / 2` for
/// rightsized candidates, 0 for exact fits.
pub fn waste_cost(candidate: &Candidate, req: &ResourceRequirements, weight: f64) -> f64 {
    if candidate.fit != Fit::Rightsized {
        return 0.0;
    }
    let unused_vcpu = f64::from(candidate.vcpu.saturating_sub(req.vcpu));
    let unused_memory = (candidate.memory_gib - req.memory_gib).max(0.0);
    let vcpu_share = unused_vcpu / f64::from(req.vcpu.max(1));
    let memory_share = if req.memory_gib > 0.0 {
        unused_memory / req.memory_gib
    } else {
        0.0
    };
    weight * (vcpu_share + memory_share) / 2.0
}

#[async_trait]
impl Stage for BinPacking {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::BinPacking
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let req = ctx.request.requirements.clone();
        for candidate in ctx.candidates.iter_mut().filter(|c| c.valid) {
            let cost = waste_cost(candidate, &req, self.waste_weight);
            if cost > 0.0 {
                debug!(pool = %candidate.pool_key(), waste_cost = cost, "charged for unused capacity");
            }
            candidate.waste_cost = Some(cost);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate, pool_request};
    use std::time::Duration;

    #[tokio::test]
    async fn charges_rightsized_only() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![
            candidate("m5.large", 2, 8.0),
            candidate("c5.xlarge", 4, 8.0).with_fit(Fit::Rightsized),
        ];

        BinPacking::new(1.0).process(&mut ctx).await.unwrap();

        // Exact fits are not charged for spare memory.
        assert_eq!(ctx.candidates[0].waste_cost, Some(0.0));
        // 2 spare vcpu on a 2 vcpu request, 4 spare GiB on a 4 GiB request.
        assert_eq!(ctx.candidates[1].waste_cost, Some(1.0));
    }

    #[test]
    fn scales_with_weight() {
        let req = pool_request(None).requirements;
        let c = candidate("c5.2xlarge", 8, 16.0).with_fit(Fit::Rightsized);
        assert_eq!(waste_cost(&c, &req, 1.0), 3.0);
        assert_eq!(waste_cost(&c, &req, 0.5), 1.5);
    }
}
