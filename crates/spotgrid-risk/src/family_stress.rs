//! Family-stress heuristic.
//!
//! Larger siblings in the same family draw on the same hardware; when
//! they are in demand the smaller sizes are reclaimed first. The score
//! adds that pressure to the pool's own history and to how close the
//! spot price sits to on-demand:
//!
//! ```text
//! p = rate_weight · interruption_rate
//!   + stress_weight · sibling_pressure
//!   + price_weight · price_ratio
//! ```

use async_trait::async_trait;

use spotgrid_core::config::FamilyStressConfig;

use crate::error::ModelResult;
use crate::features::RiskFeatures;
use crate::model::RiskModel;

#[derive(Debug, Clone, Default)]
pub struct FamilyStressModel {
    weights: FamilyStressConfig,
}

impl FamilyStressModel {
    pub fn new(weights: FamilyStressConfig) -> Self {
        Self { weights }
    }

    pub fn score(&self, features: &RiskFeatures) -> f64 {
        let w = &self.weights;
        let p = w.rate_weight * features.interruption_rate
            + w.stress_weight * features.sibling_pressure
            + w.price_weight * features.price_ratio;
        p.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl RiskModel for FamilyStressModel {
    fn name(&self) -> &'static str {
        "family-stress"
    }

    async fn predict(&self, features: &RiskFeatures) -> ModelResult<f64> {
        Ok(self.score(features))
    }
}
