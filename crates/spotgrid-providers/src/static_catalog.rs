//! Static providers backed by a catalog file.
//!
//! The file is read on first use and kept in the shared
//! [`DatasetCache`]; every pipeline in the process sees the same copy
//! until [`SharedState::invalidate_all`](crate::SharedState::invalidate_all)
//! is called.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use spotgrid_core::{InstanceSpecs, PoolQuote, PriceQuote};

use crate::cache::DatasetCache;
use crate::catalog::CatalogDataset;
use crate::error::ProviderResult;
use crate::traits::{PriceProvider, ReliabilityProvider, SpecsProvider};

pub struct StaticCatalogProvider {
    path: PathBuf,
    cache: Arc<DatasetCache<CatalogDataset>>,
}

impl StaticCatalogProvider {
    pub fn new(path: PathBuf, cache: Arc<DatasetCache<CatalogDataset>>) -> Self {
        Self { path, cache }
    }

    async fn dataset(&self) -> ProviderResult<Arc<CatalogDataset>> {
        self.cache
            .get_or_load(|| async {
                debug!(path = ?self.path, "loading catalog");
                CatalogDataset::from_file(&self.path).await
            })
            .await
    }
}

#[async_trait]
impl PriceProvider for StaticCatalogProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_price(&self, instance_type: &str, zone: &str) -> ProviderResult<PriceQuote> {
        self.dataset().await?.price(instance_type, zone)
    }

    async fn list_pools(&self, region: &str) -> ProviderResult<Vec<PoolQuote>> {
        Ok(self.dataset().await?.pools_in(region))
    }
}

#[async_trait]
impl SpecsProvider for StaticCatalogProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_specs(&self, instance_type: &str) -> ProviderResult<InstanceSpecs> {
        self.dataset().await?.specs(instance_type)
    }
}

#[async_trait]
impl ReliabilityProvider for StaticCatalogProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_interruption_rate(
        &self,
        instance_type: &str,
        zone: &str,
    ) -> ProviderResult<Option<f64>> {
        Ok(self.dataset().await?.interruption_rate(instance_type, zone))
    }
}
