//! Model inputs derived from a candidate.

use serde::{Deserialize, Serialize};

use spotgrid_core::instance::{sibling_pressure, size_rank};
use spotgrid_core::{Candidate, Fit, RateBand};

/// Numeric view of a candidate, as seen by every risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatures {
    pub instance_type: String,
    pub zone: String,
    pub vcpu: u32,
    pub memory_gib: f64,
    /// Historical interruption rate; the conservative band when unknown.
    pub interruption_rate: f64,
    /// Spot price over on-demand price.
    pub price_ratio: f64,
    pub size_rank: Option<usize>,
    /// Share of larger same-family sizes (see [`sibling_pressure`]).
    pub sibling_pressure: f64,
    pub rightsized: bool,
}

impl RiskFeatures {
    /// Feature names accepted by trained artifacts.
    pub const NAMES: &'static [&'static str] = &[
        "vcpu",
        "memory_gib",
        "interruption_rate",
        "price_ratio",
        "size_rank",
        "sibling_pressure",
        "rightsized",
    ];

    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            instance_type: candidate.instance_type.clone(),
            zone: candidate.zone.clone(),
            vcpu: candidate.vcpu,
            memory_gib: candidate.memory_gib,
            interruption_rate: candidate
                .interruption_rate
                .unwrap_or_else(|| RateBand::CONSERVATIVE.representative_rate()),
            price_ratio: candidate.price_ratio(),
            size_rank: size_rank(&candidate.instance_type),
            sibling_pressure: sibling_pressure(&candidate.instance_type),
            rightsized: candidate.fit == Fit::Rightsized,
        }
    }

    /// Value of a named feature, `None` for unknown names.
    pub fn value(&self, name: &str) -> Option<f64> {
        let v = match name {
            "vcpu" => f64::from(self.vcpu),
            "memory_gib" => self.memory_gib,
            "interruption_rate" => self.interruption_rate,
            "price_ratio" => self.price_ratio,
            "size_rank" => self.size_rank.map_or(0.0, |r| r as f64),
            "sibling_pressure" => self.sibling_pressure,
            "rightsized" => {
                if self.rightsized {
                    1.0
                } else {
                    0.0
                }
            }
            _ => return None,
        };
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotgrid_core::{Architecture, InstanceSpecs, PriceQuote};

    #[test]
    fn derived_from_candidate() {
        let candidate = Candidate::new(
            "c5.xlarge",
            "ap-south-1a",
            PriceQuote {
                spot_price: 0.05,
                on_demand_price: Some(0.2),
            },
            &InstanceSpecs {
                vcpu: 4,
                memory_gib: 8.0,
                architecture: Architecture::X86_64,
            },
        )
        .with_fit(Fit::Rightsized);

        let features = RiskFeatures::from_candidate(&candidate);
        assert_eq!(features.interruption_rate, 1.0);
        assert_eq!(features.price_ratio, 0.25);
        assert!(features.rightsized);
        assert_eq!(features.value("rightsized"), Some(1.0));
        assert_eq!(features.value("vcpu"), Some(4.0));
        assert_eq!(features.value("colour"), None);
        for name in RiskFeatures::NAMES {
            assert!(features.value(name).is_some(), "{name}");
        }
    }
}
