//! Spot Instance Advisor dataset.
//!
//! The advisor publishes one JSON document with per-region interruption
//! bands and per-type core/memory figures:
//!
//! ```json
//! {
//!   "instance_types": { "m5.large": { "emr": true, "cores": 2, "ram_gb": 8.0 } },
//!   "spot_advisor": { "us-east-1": { "Linux": { "m5.large": { "s": 70, "r": 0 } } } }
//! }
//! ```
//!
//! `r` indexes the frequency band (`<5%` .. `>20%`), `s` is the savings
//! percentage. Bands are per region; the zone only selects the region.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use spotgrid_core::instance::{infer_architecture, region_of_zone};
use spotgrid_core::{InstanceSpecs, RateBand};

use crate::cache::DatasetCache;
use crate::error::{ProviderError, ProviderResult};
use crate::live::client;
use crate::traits::{ReliabilityProvider, SpecsProvider};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvisorDataset {
    #[serde(default)]
    pub instance_types: HashMap<String, AdvisorInstanceType>,
    /// region → operating system → instance type → entry
    #[serde(default)]
    pub spot_advisor: HashMap<String, HashMap<String, HashMap<String, AdvisorEntry>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorInstanceType {
    pub cores: u32,
    pub ram_gb: f64,
    #[serde(default)]
    pub emr: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AdvisorEntry {
    /// Savings over on-demand, percent.
    pub s: u32,
    /// Interruption band index.
    pub r: u64,
}

impl AdvisorDataset {
    pub fn from_slice(bytes: &[u8]) -> ProviderResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    pub fn band(&self, region: &str, os: &str, instance_type: &str) -> Option<RateBand> {
        self.spot_advisor
            .get(region)?
            .get(os)?
            .get(instance_type)
            .map(|entry| RateBand::from_advisor_index(entry.r))
    }

    pub fn specs(&self, instance_type: &str) -> Option<InstanceSpecs> {
        self.instance_types.get(instance_type).map(|t| InstanceSpecs {
            vcpu: t.cores,
            memory_gib: t.ram_gb,
            architecture: infer_architecture(instance_type),
        })
    }
}

pub struct SpotAdvisorProvider {
    url: String,
    os: String,
    cache: Arc<DatasetCache<AdvisorDataset>>,
}

impl SpotAdvisorProvider {
    pub fn new(url: impl Into<String>, cache: Arc<DatasetCache<AdvisorDataset>>) -> Self {
        Self {
            url: url.into(),
            os: "Linux".to_string(),
            cache,
        }
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    async fn dataset(&self) -> ProviderResult<Arc<AdvisorDataset>> {
        self.cache
            .get_or_load(|| async {
                debug!(url = %self.url, "fetching spot advisor dataset");
                let resp = client::get(&self.url).await?;
                let resp = client::expect_success(resp, &self.url)?;
                AdvisorDataset::from_slice(&resp.body)
            })
            .await
    }
}

#[async_trait]
impl ReliabilityProvider for SpotAdvisorProvider {
    fn name(&self) -> &'static str {
        "spot-advisor"
    }

    async fn get_interruption_rate(
        &self,
        instance_type: &str,
        zone: &str,
    ) -> ProviderResult<Option<f64>> {
        let dataset = self.dataset().await?;
        Ok(dataset
            .band(region_of_zone(zone), &self.os, instance_type)
            .map(|band| band.representative_rate()))
    }
}

#[async_trait]
impl SpecsProvider for SpotAdvisorProvider {
    fn name(&self) -> &'static str {
        "spot-advisor"
    }

    async fn get_specs(&self, instance_type: &str) -> ProviderResult<InstanceSpecs> {
        self.dataset()
            .await?
            .specs(instance_type)
            .ok_or_else(|| ProviderError::NotFound(format!("specs for {instance_type}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::client::test_server::serve;
    use spotgrid_core::Architecture;

    const DOC: &str = r#"{
        "instance_types": {
            "c5.large": { "emr": true, "cores": 2, "ram_gb": 4.0 },
            "m6g.large": { "emr": false, "cores": 2, "ram_gb": 8.0 }
        },
        "spot_advisor": {
            "ap-south-1": {
                "Linux": {
                    "c5.large": { "s": 62, "r": 2 },
                    "m6g.large": { "s": 70, "r": 4 }
                }
            }
        }
    }"#;

    #[test]
    fn maps_bands_and_specs() {
        let dataset = AdvisorDataset::from_slice(DOC.as_bytes()).unwrap();
        assert_eq!(
            dataset.band("ap-south-1", "Linux", "c5.large"),
            Some(RateBand::Medium)
        );
        assert_eq!(
            dataset.band("ap-south-1", "Linux", "m6g.large"),
            Some(RateBand::VeryHigh)
        );
        assert_eq!(dataset.band("eu-west-1", "Linux", "c5.large"), None);
        assert_eq!(
            dataset.specs("m6g.large").unwrap().architecture,
            Architecture::Arm64
        );
    }

    #[tokio::test]
    async fn fetches_once_over_http() {
        let addr = serve(vec![("GET", "/spot-advisor-data.json", 200, DOC.to_string())]).await;
        let cache = Arc::new(DatasetCache::new());
        let provider = SpotAdvisorProvider::new(
            format!("http://{addr}/spot-advisor-data.json"),
            cache.clone(),
        );

        assert_eq!(
            provider
                .get_interruption_rate("c5.large", "ap-south-1a")
                .await
                .unwrap(),
            Some(0.125)
        );
        assert_eq!(
            provider
                .get_interruption_rate("x2.huge", "ap-south-1a")
                .await
                .unwrap(),
            None
        );
        assert_eq!(provider.get_specs("c5.large").await.unwrap().vcpu, 2);
        assert_eq!(cache.load_count(), 1);
    }
}
