//! spotgrid-risk — crash-probability models.
//!
//! Every model implements [`RiskModel`]: given the [`RiskFeatures`] of one
//! candidate it returns the probability (0.0–1.0) that the pool is
//! interrupted in the near term. Models never abort an evaluation; a
//! model that cannot load is replaced by [`ConservativeModel`].

pub mod error;
pub mod family_stress;
pub mod features;
pub mod logistic;
pub mod model;
pub mod registry;

use std::sync::Arc;

use spotgrid_core::{RiskModelKind, config::RiskConfig};

pub use error::{ModelError, ModelResult};
pub use family_stress::FamilyStressModel;
pub use features::RiskFeatures;
pub use logistic::{LogisticArtifact, LogisticModel};
pub use model::{ConservativeModel, MockRiskModel, RiskModel};
pub use registry::ModelRegistry;

/// Build the model selected by `risk.kind`.
///
/// Registry load failures do not surface here: the registry substitutes
/// a [`ConservativeModel`] and logs the reason.
pub fn model_from_config(config: &RiskConfig) -> Arc<dyn RiskModel> {
    match config.kind {
        RiskModelKind::Mock => Arc::new(MockRiskModel::new(config.mock_probability)),
        RiskModelKind::FamilyStress => {
            Arc::new(FamilyStressModel::new(config.family_stress.clone()))
        }
        RiskModelKind::Registry => {
            let dir = config.registry_dir.clone().unwrap_or_default();
            let name = config.model_name.clone().unwrap_or_default();
            ModelRegistry::new(dir, config.fallback_probability).load(&name)
        }
    }
}
