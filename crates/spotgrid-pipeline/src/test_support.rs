use std::time::Duration;

use spotgrid_core::{
    Architecture, Candidate, CurrentInstance, EvaluationMode, EvaluationRequest, InstanceSpecs,
    PriceQuote, ResourceRequirements, VcpuBand,
};
use spotgrid_providers::{CallPolicy, MockProviders, ProviderSet};

pub fn specs(vcpu: u32, memory_gib: f64) -> InstanceSpecs {
    InstanceSpecs {
        vcpu,
        memory_gib,
        architecture: Architecture::X86_64,
    }
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

pub fn candidate(instance_type: &str, vcpu: u32, memory_gib: f64) -> Candidate {
    Candidate::new(
        instance_type,
        "ap-south-1a",
        PriceQuote {
            spot_price: 0.035,
            on_demand_price: Some(0.085),
        },
        &specs(vcpu, memory_gib),
    )
}

fn requirements(vcpu_band: Option<VcpuBand>) -> ResourceRequirements {
    ResourceRequirements {
        vcpu: 2,
        memory_gib: 4.0,
        architecture: Architecture::X86_64,
        vcpu_band,
    }
}

pub fn single_request() -> EvaluationRequest {
    EvaluationRequest {
        mode: EvaluationMode::SingleInstance,
        region: "ap-south-1".into(),
        current: Some(CurrentInstance {
            instance_id: "i-0abc".into(),
            instance_type: "c5.large".into(),
            zone: "ap-south-1a".into(),
        }),
        requirements: requirements(None),
    }
}

pub fn pool_request(vcpu_band: Option<VcpuBand>) -> EvaluationRequest {
    EvaluationRequest {
        mode: EvaluationMode::PoolSearch,
        region: "ap-south-1".into(),
        current: None,
        requirements: requirements(vcpu_band),
    }
}
