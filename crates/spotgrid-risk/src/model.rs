//! The risk-model interface and the trivial models.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{ModelError, ModelResult};
use crate::features::RiskFeatures;

/// Scores the near-term interruption probability of one candidate.
#[async_trait]
pub trait RiskModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Probability in 0.0..=1.0. Callers clamp anyway.
    async fn predict(&self, features: &RiskFeatures) -> ModelResult<f64>;
}

/// Deterministic model for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MockRiskModel {
    default: f64,
    overrides: HashMap<String, f64>,
    failing: bool,
}

impl MockRiskModel {
    pub fn new(default: f64) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    /// Fixed probability for one instance type.
    pub fn with_override(mut self, instance_type: &str, probability: f64) -> Self {
        self.overrides.insert(instance_type.to_string(), probability);
        self
    }

    /// Fail every prediction.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl RiskModel for MockRiskModel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn predict(&self, features: &RiskFeatures) -> ModelResult<f64> {
        if self.failing {
            return Err(ModelError::Predict("mock model configured to fail".into()));
        }
        Ok(self
            .overrides
            .get(&features.instance_type)
            .copied()
            .unwrap_or(self.default))
    }
}

/// Stand-in for a model that could not be loaded: every candidate gets
/// the fallback probability.
#[derive(Debug, Clone)]
pub struct ConservativeModel {
    probability: f64,
}

impl ConservativeModel {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

#[async_trait]
impl RiskModel for ConservativeModel {
    fn name(&self) -> &'static str {
        "conservative"
    }

    async fn predict(&self, _features: &RiskFeatures) -> ModelResult<f64> {
        Ok(self.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(instance_type: &str) -> RiskFeatures {
        RiskFeatures {
            instance_type: instance_type.to_string(),
            zone: "ap-south-1a".to_string(),
            vcpu: 2,
            memory_gib: 4.0,
            interruption_rate: 0.1,
            price_ratio: 0.4,
            size_rank: Some(4),
            sibling_pressure: 0.8,
            rightsized: false,
        }
    }

    #[tokio::test]
    async fn mock_overrides_by_type() {
        let model = MockRiskModel::new(0.1).with_override("c5.large", 0.9);
        assert_eq!(model.predict(&features("c5.large")).await.unwrap(), 0.9);
        assert_eq!(model.predict(&features("m5.large")).await.unwrap(), 0.1);
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        assert!(MockRiskModel::failing().predict(&features("c5.large")).await.is_err());
    }

    #[tokio::test]
    async fn conservative_is_constant() {
        let model = ConservativeModel::new(1.0);
        assert_eq!(model.predict(&features("c5.large")).await.unwrap(), 1.0);
    }
}
