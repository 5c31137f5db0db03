//! Domain types shared across spotgrid crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Decisions and signals ──────────────────────────────────────────

/// Final outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Keep the current instance running.
    Stay,
    /// Move to the selected pool.
    Switch,
    /// Start moving the workload off; no hard deadline yet.
    Drain,
    /// Capacity is being reclaimed; leave now.
    Evacuate,
    /// No candidate cleared the gates.
    Reject,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Stay => "STAY",
            Decision::Switch => "SWITCH",
            Decision::Drain => "DRAIN",
            Decision::Evacuate => "EVACUATE",
            Decision::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Live interruption signal for a running instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    #[default]
    None,
    /// Early, non-binding rebalance recommendation.
    Rebalance,
    /// Termination notice; reclamation is imminent.
    Termination,
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Signal::None => "NONE",
            Signal::Rebalance => "REBALANCE",
            Signal::Termination => "TERMINATION",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Hardware ───────────────────────────────────────────────────────

/// Processor architecture of an instance type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    #[serde(alias = "amd64", alias = "x86-64")]
    X86_64,
    #[serde(alias = "aarch64", alias = "arm")]
    Arm64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_64 => f.write_str("x86_64"),
            Architecture::Arm64 => f.write_str("arm64"),
        }
    }
}

/// Hardware description of an instance type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpecs {
    pub vcpu: u32,
    pub memory_gib: f64,
    #[serde(default)]
    pub architecture: Architecture,
}

/// Spot and on-demand hourly price for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub spot_price: f64,
    pub on_demand_price: Option<f64>,
}

/// A priced pool returned by catalog enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolQuote {
    pub instance_type: String,
    pub zone: String,
    #[serde(flatten)]
    pub price: PriceQuote,
}

// ── Reliability bands ──────────────────────────────────────────────

/// Historical interruption-frequency band, as published by the Spot
/// Instance Advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBand {
    /// Below 5%.
    VeryLow,
    /// 5–10%.
    Low,
    /// 10–15%.
    Medium,
    /// 15–20%.
    High,
    /// Above 20%.
    VeryHigh,
}

impl RateBand {
    /// The band assumed when no data is available.
    pub const CONSERVATIVE: RateBand = RateBand::VeryHigh;

    /// Map a Spot Advisor range index (`r` field, 0..=4).
    pub fn from_advisor_index(index: u64) -> Self {
        match index {
            0 => RateBand::VeryLow,
            1 => RateBand::Low,
            2 => RateBand::Medium,
            3 => RateBand::High,
            _ => RateBand::VeryHigh,
        }
    }

    pub fn from_rate(rate: f64) -> Self {
        match rate {
            r if r < 0.05 => RateBand::VeryLow,
            r if r < 0.10 => RateBand::Low,
            r if r < 0.15 => RateBand::Medium,
            r if r <= 0.20 => RateBand::High,
            _ => RateBand::VeryHigh,
        }
    }

    /// Rate used for filtering. Bounded bands use their midpoint; the open
    /// top band uses its upper bound.
    pub fn representative_rate(&self) -> f64 {
        match self {
            RateBand::VeryLow => 0.025,
            RateBand::Low => 0.075,
            RateBand::Medium => 0.125,
            RateBand::High => 0.175,
            RateBand::VeryHigh => 1.0,
        }
    }
}

// ── Request ────────────────────────────────────────────────────────

/// How the request should be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Test the currently running instance.
    SingleInstance,
    /// Search the region for the best pool.
    PoolSearch,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::SingleInstance => f.write_str("single_instance"),
            EvaluationMode::PoolSearch => f.write_str("pool_search"),
        }
    }
}

/// The instance currently running the workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentInstance {
    pub instance_id: String,
    pub instance_type: String,
    pub zone: String,
}

/// Inclusive vcpu range a workload may be rightsized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcpuBand {
    pub min: u32,
    pub max: u32,
}

impl VcpuBand {
    pub fn contains(&self, vcpu: u32) -> bool {
        (self.min..=self.max).contains(&vcpu)
    }
}

/// Resources the workload needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub vcpu: u32,
    pub memory_gib: f64,
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(default)]
    pub vcpu_band: Option<VcpuBand>,
}

/// One evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub mode: EvaluationMode,
    pub region: String,
    #[serde(default)]
    pub current: Option<CurrentInstance>,
    pub requirements: ResourceRequirements,
}

impl EvaluationRequest {
    /// Reject malformed requests before any stage runs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.region.trim().is_empty() {
            return Err(ValidationError::Missing("region"));
        }

        let req = &self.requirements;
        if req.vcpu == 0 {
            return Err(ValidationError::Invalid {
                field: "requirements.vcpu",
                reason: "must be at least 1".to_string(),
            });
        }
        if !req.memory_gib.is_finite() || req.memory_gib <= 0.0 {
            return Err(ValidationError::Invalid {
                field: "requirements.memory_gib",
                reason: format!("must be a positive number, got {}", req.memory_gib),
            });
        }
        if let Some(band) = req.vcpu_band {
            if band.min > band.max {
                return Err(ValidationError::Invalid {
                    field: "requirements.vcpu_band",
                    reason: format!("min {} exceeds max {}", band.min, band.max),
                });
            }
            if band.max < req.vcpu {
                return Err(ValidationError::Invalid {
                    field: "requirements.vcpu_band",
                    reason: format!("max {} is below the requested {} vcpu", band.max, req.vcpu),
                });
            }
        }

        if self.mode == EvaluationMode::SingleInstance {
            let current = self.current.as_ref().ok_or(ValidationError::Missing("current"))?;
            if current.instance_id.trim().is_empty() {
                return Err(ValidationError::Missing("current.instance_id"));
            }
            if current.instance_type.trim().is_empty() {
                return Err(ValidationError::Missing("current.instance_type"));
            }
            if !current.zone.starts_with(self.region.as_str()) {
                return Err(ValidationError::Invalid {
                    field: "current.zone",
                    reason: format!("{} is not in region {}", current.zone, self.region),
                });
            }
        }

        Ok(())
    }
}

// ── Candidates ─────────────────────────────────────────────────────

/// Whether a candidate matches the request exactly or is oversized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    #[default]
    Exact,
    Rightsized,
}

/// Why and where a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub stage: String,
    pub reason: String,
}

/// One (instance type, zone) pool under consideration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub instance_type: String,
    pub zone: String,
    pub spot_price: f64,
    pub on_demand_price: Option<f64>,
    pub vcpu: u32,
    pub memory_gib: f64,
    pub architecture: Architecture,
    /// Historical interruption rate (0.0–1.0), filled by the reliability lookup.
    pub interruption_rate: Option<f64>,
    /// Unset until the risk model scores the candidate.
    pub crash_probability: Option<f64>,
    /// Unset until bin-packing charges the candidate.
    pub waste_cost: Option<f64>,
    /// Unset until ranking.
    pub yield_score: Option<f64>,
    pub fit: Fit,
    /// This candidate is the instance currently running the workload.
    pub is_current: bool,
    pub valid: bool,
    pub rejection: Option<Rejection>,
}

impl Candidate {
    /// Build a valid, unscored candidate.
    pub fn new(
        instance_type: impl Into<String>,
        zone: impl Into<String>,
        price: PriceQuote,
        specs: &InstanceSpecs,
    ) -> Self {
        Self {
            instance_type: instance_type.into(),
            zone: zone.into(),
            spot_price: price.spot_price,
            on_demand_price: price.on_demand_price,
            vcpu: specs.vcpu,
            memory_gib: specs.memory_gib,
            architecture: specs.architecture,
            interruption_rate: None,
            crash_probability: None,
            waste_cost: None,
            yield_score: None,
            fit: Fit::Exact,
            is_current: false,
            valid: true,
            rejection: None,
        }
    }

    /// Build a placeholder for a pool that could not be resolved. It is
    /// recorded in the collection and rejected immediately.
    pub fn unresolved(
        instance_type: impl Into<String>,
        zone: impl Into<String>,
        stage: &str,
        reason: impl Into<String>,
    ) -> Self {
        let mut candidate = Self::new(
            instance_type,
            zone,
            PriceQuote {
                spot_price: 0.0,
                on_demand_price: None,
            },
            &InstanceSpecs {
                vcpu: 0,
                memory_gib: 0.0,
                architecture: Architecture::default(),
            },
        );
        candidate.reject(stage, reason);
        candidate
    }

    pub fn with_fit(mut self, fit: Fit) -> Self {
        self.fit = fit;
        self
    }

    pub fn as_current(mut self) -> Self {
        self.is_current = true;
        self
    }

    /// `{instance_type}@{zone}`.
    pub fn pool_key(&self) -> String {
        format!("{}@{}", self.instance_type, self.zone)
    }

    /// Mark the candidate invalid. The first rejection wins; later calls
    /// are ignored and return `false`.
    pub fn reject(&mut self, stage: &str, reason: impl Into<String>) -> bool {
        if self.rejection.is_some() {
            return false;
        }
        self.valid = false;
        self.rejection = Some(Rejection {
            stage: stage.to_string(),
            reason: reason.into(),
        });
        true
    }

    /// `1 - spot / reference`, where the reference is the on-demand price
    /// when known and `fallback_reference` otherwise. Not clamped: a spot
    /// price above the reference yields a negative fraction.
    pub fn savings_against(&self, fallback_reference: f64) -> f64 {
        let reference = match self.on_demand_price {
            Some(od) if od > 0.0 => od,
            _ => fallback_reference,
        };
        if reference > 0.0 {
            1.0 - self.spot_price / reference
        } else {
            0.0
        }
    }

    /// Spot price as a fraction of on-demand (1.0 when unknown).
    pub fn price_ratio(&self) -> f64 {
        match self.on_demand_price {
            Some(od) if od > 0.0 => (self.spot_price / od).clamp(0.0, 1.0),
            _ => 1.0,
        }
    }
}
