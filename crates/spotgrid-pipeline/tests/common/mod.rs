#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use spotgrid_core::{
    Architecture, CurrentInstance, EvaluationMode, EvaluationRequest, InstanceSpecs,
    PipelineConfig, ResourceRequirements, ValidatedConfig, VcpuBand,
};
use spotgrid_pipeline::{Pipeline, RecordingActuator};
use spotgrid_providers::{CallPolicy, MockProviders, ProviderSet};
use spotgrid_risk::{MockRiskModel, RiskModel};

pub const REGION: &str = "ap-south-1";
pub const ZONE: &str = "ap-south-1a";
pub const INSTANCE_ID: &str = "i-0abc";

pub fn specs(vcpu: u32, memory_gib: f64) -> InstanceSpecs {
    InstanceSpecs {
        vcpu,
        memory_gib,
        architecture: Architecture::X86_64,
    }
}

/// Default configuration with `edit` applied, validated.
pub fn config(edit: impl FnOnce(&mut PipelineConfig)) -> Arc<ValidatedConfig> {
    let mut config = PipelineConfig::default();
    config.providers.timeout_ms = 500;
    config.providers.retry_backoff_ms = 1;
    edit(&mut config);
    Arc::new(config.validate().expect("test config is valid"))
}

pub fn providers(mock: MockProviders) -> ProviderSet {
    ProviderSet::from_mock(
        mock,
        CallPolicy {
            timeout: Duration::from_millis(500),
            backoff: Duration::from_millis(1),
        },
    )
}

/// c5.large in ap-south-1a with a 10–15% interruption history.
pub fn current_pool() -> MockProviders {
    MockProviders::new()
        .with_instance_type("c5.large", specs(2, 4.0))
        .with_pool("c5.large", ZONE, 0.035, 0.085)
        .with_rate("c5.large", ZONE, 0.125)
}

pub fn single_request() -> EvaluationRequest {
    EvaluationRequest {
        mode: EvaluationMode::SingleInstance,
        region: REGION.into(),
        current: Some(CurrentInstance {
            instance_id: INSTANCE_ID.into(),
            instance_type: "c5.large".into(),
            zone: ZONE.into(),
        }),
        requirements: ResourceRequirements {
            vcpu: 2,
            memory_gib: 4.0,
            architecture: Architecture::X86_64,
            vcpu_band: None,
        },
    }
}

pub fn pool_request(vcpu_band: Option<VcpuBand>) -> EvaluationRequest {
    EvaluationRequest {
        mode: EvaluationMode::PoolSearch,
        region: REGION.into(),
        current: None,
        requirements: ResourceRequirements {
            vcpu: 2,
            memory_gib: 4.0,
            architecture: Architecture::X86_64,
            vcpu_band,
        },
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub actuator: RecordingActuator,
}

pub fn harness(
    config: Arc<ValidatedConfig>,
    mock: MockProviders,
    model: Arc<dyn RiskModel>,
) -> Harness {
    let actuator = RecordingActuator::new();
    let pipeline = Pipeline::from_config(
        config,
        providers(mock),
        model,
        Arc::new(actuator.clone()),
    )
    .expect("pipeline builds");
    Harness { pipeline, actuator }
}

pub fn safe_model() -> Arc<dyn RiskModel> {
    Arc::new(MockRiskModel::new(0.0))
}
