//! Pool catalog — the JSON document behind static and mock providers.
//!
//! ```json
//! {
//!   "instance_types": {
//!     "c5.large": { "vcpu": 2, "memory_gib": 4.0, "architecture": "x86_64" }
//!   },
//!   "pools": [
//!     { "instance_type": "c5.large", "zone": "ap-south-1a",
//!       "spot_price": 0.035, "on_demand_price": 0.085,
//!       "interruption_rate": 0.125 }
//!   ]
//! }
//! ```
//!
//! A pool may carry an exact `interruption_rate`, a Spot Advisor
//! `rate_band`, or neither (no data).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use spotgrid_core::{InstanceSpecs, PoolQuote, PriceQuote, RateBand};

use crate::error::{ProviderError, ProviderResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDataset {
    #[serde(default)]
    pub instance_types: BTreeMap<String, InstanceSpecs>,
    #[serde(default)]
    pub pools: Vec<CatalogPool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPool {
    pub instance_type: String,
    pub zone: String,
    pub spot_price: f64,
    #[serde(default)]
    pub on_demand_price: Option<f64>,
    #[serde(default)]
    pub interruption_rate: Option<f64>,
    #[serde(default)]
    pub rate_band: Option<RateBand>,
}

impl CatalogPool {
    fn quote(&self) -> PriceQuote {
        PriceQuote {
            spot_price: self.spot_price,
            on_demand_price: self.on_demand_price,
        }
    }
}

impl CatalogDataset {
    pub async fn from_file(path: &Path) -> ProviderResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ProviderError::Unavailable(format!("read catalog {}: {e}", path.display()))
        })?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> ProviderResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn pool(&self, instance_type: &str, zone: &str) -> Option<&CatalogPool> {
        self.pools
            .iter()
            .find(|p| p.instance_type == instance_type && p.zone == zone)
    }

    pub fn price(&self, instance_type: &str, zone: &str) -> ProviderResult<PriceQuote> {
        self.pool(instance_type, zone)
            .map(CatalogPool::quote)
            .ok_or_else(|| ProviderError::NotFound(format!("price for {instance_type}@{zone}")))
    }

    /// Pools whose zone belongs to `region`, in catalog order.
    pub fn pools_in(&self, region: &str) -> Vec<PoolQuote> {
        self.pools
            .iter()
            .filter(|p| p.zone.starts_with(region))
            .map(|p| PoolQuote {
                instance_type: p.instance_type.clone(),
                zone: p.zone.clone(),
                price: p.quote(),
            })
            .collect()
    }

    pub fn specs(&self, instance_type: &str) -> ProviderResult<InstanceSpecs> {
        self.instance_types
            .get(instance_type)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("specs for {instance_type}")))
    }

    /// Exact rate if recorded, else the band's representative rate,
    /// else `None`.
    pub fn interruption_rate(&self, instance_type: &str, zone: &str) -> Option<f64> {
        let pool = self.pool(instance_type, zone)?;
        pool.interruption_rate
            .or_else(|| pool.rate_band.map(|band| band.representative_rate()))
    }
}
