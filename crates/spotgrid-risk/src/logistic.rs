//! Trained logistic classifier.
//!
//! Artifacts are produced offline and stored as JSON:
//!
//! ```json
//! {
//!   "name": "spot-v3",
//!   "version": "2026-09-30",
//!   "intercept": -3.2,
//!   "weights": { "interruption_rate": 14.0, "sibling_pressure": 1.1 }
//! }
//! ```
//!
//! Features missing from `weights` contribute nothing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::features::RiskFeatures;
use crate::model::RiskModel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub name: String,
    pub version: String,
    pub intercept: f64,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl LogisticArtifact {
    pub fn from_slice(bytes: &[u8]) -> ModelResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ModelError::Artifact(e.to_string()))
    }

    /// Reject weights for unknown features and non-finite coefficients.
    pub fn check(&self) -> ModelResult<()> {
        if !self.intercept.is_finite() {
            return Err(ModelError::Artifact("intercept is not finite".into()));
        }
        for (feature, weight) in &self.weights {
            if !RiskFeatures::NAMES.contains(&feature.as_str()) {
                return Err(ModelError::Artifact(format!("unknown feature {feature}")));
            }
            if !weight.is_finite() {
                return Err(ModelError::Artifact(format!("weight for {feature} is not finite")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    artifact: LogisticArtifact,
}

impl LogisticModel {
    pub fn new(artifact: LogisticArtifact) -> ModelResult<Self> {
        artifact.check()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &LogisticArtifact {
        &self.artifact
    }

    pub fn score(&self, features: &RiskFeatures) -> ModelResult<f64> {
        let mut z = self.artifact.intercept;
        for (feature, weight) in &self.artifact.weights {
            let x = features
                .value(feature)
                .ok_or_else(|| ModelError::Predict(format!("feature {feature} unavailable")))?;
            z += weight * x;
        }
        let p = 1.0 / (1.0 + (-z).exp());
        if p.is_finite() {
            Ok(p)
        } else {
            Err(ModelError::Predict(format!("non-finite output for z = {z}")))
        }
    }
}

#[async_trait]
impl RiskModel for LogisticModel {
    fn name(&self) -> &'static str {
        "logistic"
    }

    async fn predict(&self, features: &RiskFeatures) -> ModelResult<f64> {
        self.score(features)
    }
}
