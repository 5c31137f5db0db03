//! Model registry backed by a directory of artifacts.
//!
//! `<dir>/<name>.json` holds a [`LogisticArtifact`]. A model that cannot
//! be read, parsed or checked is replaced by a [`ConservativeModel`] so
//! the evaluation still answers, just pessimistically.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ModelError, ModelResult};
use crate::logistic::{LogisticArtifact, LogisticModel};
use crate::model::{ConservativeModel, RiskModel};

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    dir: PathBuf,
    fallback_probability: f64,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>, fallback_probability: f64) -> Self {
        Self {
            dir: dir.into(),
            fallback_probability,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Load `name`, or substitute the conservative model.
    pub fn load(&self, name: &str) -> Arc<dyn RiskModel> {
        match self.try_load(name) {
            Ok(model) => {
                info!(
                    model = %name,
                    version = %model.artifact().version,
                    "risk model loaded"
                );
                Arc::new(model)
            }
            Err(e) => {
                warn!(
                    model = %name,
                    error = %e,
                    fallback = self.fallback_probability,
                    "risk model unavailable, using conservative fallback"
                );
                Arc::new(ConservativeModel::new(self.fallback_probability))
            }
        }
    }

    pub fn try_load(&self, name: &str) -> ModelResult<LogisticModel> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ModelError::Load {
                name: name.to_string(),
                reason: "invalid model name".into(),
            });
        }
        let path = self.artifact_path(name);
        let bytes = std::fs::read(&path).map_err(|e| ModelError::Load {
            name: name.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let artifact = LogisticArtifact::from_slice(&bytes)?;
        if artifact.name != name {
            return Err(ModelError::Artifact(format!(
                "{} declares name {}",
                path.display(),
                artifact.name
            )));
        }
        LogisticModel::new(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RiskFeatures;

    fn features() -> RiskFeatures {
        RiskFeatures {
            instance_type: "c5.large".to_string(),
            zone: "ap-south-1a".to_string(),
            vcpu: 2,
            memory_gib: 4.0,
            interruption_rate: 0.125,
            price_ratio: 0.4,
            size_rank: Some(4),
            sibling_pressure: 0.8,
            rightsized: false,
        }
    }

    #[tokio::test]
    async fn loads_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("spot-v3.json"),
            r#"{"name": "spot-v3", "version": "2026-09-30", "intercept": -1.0,
                "weights": {"interruption_rate": 8.0}}"#,
        )
        .unwrap();

        let registry = ModelRegistry::new(dir.path(), 1.0);
        let model = registry.load("spot-v3");
        assert_eq!(model.name(), "logistic");
        let p = model.predict(&features()).await.unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn missing_artifact_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path(), 0.95);
        assert!(matches!(
            registry.try_load("spot-v3"),
            Err(ModelError::Load { .. })
        ));

        let model = registry.load("spot-v3");
        assert_eq!(model.name(), "conservative");
        assert_eq!(model.predict(&features()).await.unwrap(), 0.95);
    }

    #[test]
    fn corrupt_or_mislabelled_artifacts_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(
            dir.path().join("renamed.json"),
            r#"{"name": "other", "version": "1", "intercept": 0.0}"#,
        )
        .unwrap();

        let registry = ModelRegistry::new(dir.path(), 1.0);
        assert!(matches!(registry.try_load("broken"), Err(ModelError::Artifact(_))));
        assert!(matches!(registry.try_load("renamed"), Err(ModelError::Artifact(_))));
        assert!(registry.try_load("../escape").is_err());
    }
}
