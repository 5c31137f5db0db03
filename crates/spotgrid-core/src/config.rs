//! `spotgrid.toml` pipeline configuration.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! [`PipelineConfig::validate`] is the only way to obtain a
//! [`ValidatedConfig`], which pipelines hold for their whole lifetime.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Spot Instance Advisor dataset (served over plain HTTP by S3 as well).
pub const DEFAULT_ADVISOR_URL: &str = "http://spot-bid-advisor.s3.amazonaws.com/spot-advisor-data.json";

/// EC2 instance metadata service.
pub const DEFAULT_IMDS_ADDRESS: &str = "169.254.169.254:80";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Allows disabling the signal override. Never enable in production.
    pub test_mode: bool,
    /// Wall-clock budget for one execution, in milliseconds.
    pub execution_budget_ms: Option<u64>,
    pub stages: StagesConfig,
    pub thresholds: ThresholdsConfig,
    pub input: InputConfig,
    pub providers: ProvidersConfig,
    pub risk: RiskConfig,
    pub ranking: RankingConfig,
    pub actuator: ActuatorConfig,
}

/// Per-stage enable flags. Input adapter and actuator always run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub hardware_filter: bool,
    pub historical_filter: bool,
    pub rightsizing: bool,
    pub risk_model: bool,
    pub safety_gate: bool,
    pub bin_packing: bool,
    pub cost_ranking: bool,
    pub signal_override: bool,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            hardware_filter: true,
            historical_filter: true,
            rightsizing: true,
            risk_model: true,
            safety_gate: true,
            bin_packing: true,
            cost_ranking: true,
            signal_override: true,
        }
    }
}

impl StagesConfig {
    /// Every optional stage off. Only legal together with `test_mode`.
    pub fn none() -> Self {
        Self {
            hardware_filter: false,
            historical_filter: false,
            rightsizing: false,
            risk_model: false,
            safety_gate: false,
            bin_packing: false,
            cost_ranking: false,
            signal_override: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Safety gate ceiling on crash probability.
    pub max_crash_probability: f64,
    /// Historical filter ceiling on interruption rate.
    pub max_interruption_rate: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            max_crash_probability: 0.85,
            max_interruption_rate: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Pick the adapter from the request mode.
    #[default]
    Auto,
    SingleInstance,
    PoolSearch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub kind: InputKind,
}

/// Which implementation backs a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSource {
    #[default]
    Mock,
    /// JSON catalog file on disk.
    Static,
    /// Remote endpoint.
    Live,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub price: ProviderSource,
    pub specs: ProviderSource,
    pub reliability: ProviderSource,
    pub signal: ProviderSource,
    /// Catalog file used by static providers.
    pub catalog_path: Option<PathBuf>,
    /// Price feed base URL used by the live price provider.
    pub price_feed_url: Option<String>,
    pub advisor_url: String,
    pub imds_address: String,
    /// Per-attempt timeout for every provider call.
    pub timeout_ms: u64,
    /// Pause before the single retry.
    pub retry_backoff_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            price: ProviderSource::Mock,
            specs: ProviderSource::Mock,
            reliability: ProviderSource::Mock,
            signal: ProviderSource::Mock,
            catalog_path: None,
            price_feed_url: None,
            advisor_url: DEFAULT_ADVISOR_URL.to_string(),
            imds_address: DEFAULT_IMDS_ADDRESS.to_string(),
            timeout_ms: 2_000,
            retry_backoff_ms: 200,
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskModelKind {
    #[default]
    Mock,
    FamilyStress,
    Registry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub kind: RiskModelKind,
    /// Probability assigned when a model cannot load or predict.
    pub fallback_probability: f64,
    /// Constant returned by the mock model.
    pub mock_probability: f64,
    pub registry_dir: Option<PathBuf>,
    pub model_name: Option<String>,
    pub family_stress: FamilyStressConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            kind: RiskModelKind::Mock,
            fallback_probability: 1.0,
            mock_probability: 0.1,
            registry_dir: None,
            model_name: None,
            family_stress: FamilyStressConfig::default(),
        }
    }
}

/// Weights of the family-stress heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyStressConfig {
    pub rate_weight: f64,
    pub stress_weight: f64,
    pub price_weight: f64,
}

impl Default for FamilyStressConfig {
    fn default() -> Self {
        Self {
            rate_weight: 1.5,
            stress_weight: 0.3,
            price_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Recommendations kept in pool-search mode.
    pub top_n: usize,
    /// Yield margin an alternative must beat the current instance by.
    pub min_improvement: f64,
    /// Multiplier on the bin-packing waste cost.
    pub waste_weight: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            min_improvement: 0.0,
            waste_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Log the decision.
    #[default]
    Logging,
    /// Keep decisions in memory.
    Recording,
    /// Hand the decision to an externally supplied callback.
    External,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub kind: ActuatorKind,
}

impl PipelineConfig {
    pub const DEFAULT_BUDGET: Duration = Duration::from_secs(30);

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn execution_budget(&self) -> Duration {
        self.execution_budget_ms
            .map(Duration::from_millis)
            .unwrap_or(Self::DEFAULT_BUDGET)
    }

    /// Check every field once and freeze the result.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        unit_interval(
            "thresholds.max_crash_probability",
            self.thresholds.max_crash_probability,
        )?;
        unit_interval(
            "thresholds.max_interruption_rate",
            self.thresholds.max_interruption_rate,
        )?;
        unit_interval("risk.fallback_probability", self.risk.fallback_probability)?;
        unit_interval("risk.mock_probability", self.risk.mock_probability)?;

        if self.execution_budget_ms == Some(0) {
            return Err(ConfigError::invalid("execution_budget_ms", "must be positive"));
        }
        if self.providers.timeout_ms == 0 {
            return Err(ConfigError::invalid("providers.timeout_ms", "must be positive"));
        }
        if self.ranking.top_n == 0 {
            return Err(ConfigError::invalid("ranking.top_n", "must be at least 1"));
        }
        if !self.ranking.min_improvement.is_finite() || self.ranking.min_improvement < 0.0 {
            return Err(ConfigError::invalid(
                "ranking.min_improvement",
                "must be a non-negative number",
            ));
        }
        if !self.ranking.waste_weight.is_finite() || self.ranking.waste_weight < 0.0 {
            return Err(ConfigError::invalid(
                "ranking.waste_weight",
                "must be a non-negative number",
            ));
        }

        if !self.stages.signal_override && !self.test_mode {
            return Err(ConfigError::invalid(
                "stages.signal_override",
                "can only be disabled with test_mode = true",
            ));
        }
        if !self.stages.risk_model && !self.test_mode {
            return Err(ConfigError::invalid(
                "stages.risk_model",
                "can only be disabled with test_mode = true",
            ));
        }
        if !self.stages.safety_gate && !self.test_mode {
            return Err(ConfigError::invalid(
                "stages.safety_gate",
                "can only be disabled with test_mode = true",
            ));
        }

        let uses_static = [
            self.providers.price,
            self.providers.specs,
            self.providers.reliability,
        ]
        .contains(&ProviderSource::Static);
        if uses_static && self.providers.catalog_path.is_none() {
            return Err(ConfigError::invalid(
                "providers.catalog_path",
                "required by static providers",
            ));
        }
        if self.providers.signal == ProviderSource::Static {
            return Err(ConfigError::invalid(
                "providers.signal",
                "live signals have no static source; use mock or live",
            ));
        }
        if self.providers.price == ProviderSource::Live && self.providers.price_feed_url.is_none()
        {
            return Err(ConfigError::invalid(
                "providers.price_feed_url",
                "required by the live price provider",
            ));
        }

        if self.risk.kind == RiskModelKind::Registry {
            if self.risk.registry_dir.is_none() {
                return Err(ConfigError::invalid(
                    "risk.registry_dir",
                    "required by the registry risk model",
                ));
            }
            if self.risk.model_name.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::invalid(
                    "risk.model_name",
                    "required by the registry risk model",
                ));
            }
        }

        Ok(ValidatedConfig(self))
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside 0.0..=1.0")))
    }
}

/// A configuration that passed [`PipelineConfig::validate`]. Read-only.
#[derive(Debug, Clone)]
pub struct ValidatedConfig(PipelineConfig);

impl Deref for ValidatedConfig {
    type Target = PipelineConfig;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ValidatedConfig {
    pub fn into_inner(self) -> PipelineConfig {
        self.0
    }
}
