//! In-memory providers for tests and dry runs.
//!
//! One [`MockProviders`] value implements all four provider traits from a
//! [`CatalogDataset`] plus a per-instance signal table. Faults and latency
//! can be injected per capability to exercise the degraded branches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use spotgrid_core::{InstanceSpecs, PoolQuote, PriceQuote, RateBand, Signal};

use crate::catalog::{CatalogDataset, CatalogPool};
use crate::error::{ProviderError, ProviderResult};
use crate::traits::{PriceProvider, ReliabilityProvider, SignalProvider, SpecsProvider};

/// Capability a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFault {
    Price,
    Specs,
    Reliability,
    Signal,
}

#[derive(Debug, Clone, Default)]
pub struct MockProviders {
    catalog: CatalogDataset,
    signals: HashMap<String, Signal>,
    default_signal: Signal,
    faults: HashSet<MockFault>,
    latency: Option<Duration>,
    calls: Arc<AtomicU64>,
}

impl MockProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: CatalogDataset) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn with_instance_type(mut self, instance_type: &str, specs: InstanceSpecs) -> Self {
        self.catalog
            .instance_types
            .insert(instance_type.to_string(), specs);
        self
    }

    pub fn with_pool(
        mut self,
        instance_type: &str,
        zone: &str,
        spot_price: f64,
        on_demand_price: f64,
    ) -> Self {
        self.push_pool(instance_type, zone, spot_price, Some(on_demand_price));
        self
    }

    /// A pool whose on-demand price is not published.
    pub fn with_spot_only_pool(mut self, instance_type: &str, zone: &str, spot_price: f64) -> Self {
        self.push_pool(instance_type, zone, spot_price, None);
        self
    }

    fn push_pool(
        &mut self,
        instance_type: &str,
        zone: &str,
        spot_price: f64,
        on_demand_price: Option<f64>,
    ) {
        self.catalog.pools.push(CatalogPool {
            instance_type: instance_type.to_string(),
            zone: zone.to_string(),
            spot_price,
            on_demand_price,
            interruption_rate: None,
            rate_band: None,
        });
    }

    /// Record an exact interruption rate for an existing pool.
    pub fn with_rate(mut self, instance_type: &str, zone: &str, rate: f64) -> Self {
        if let Some(pool) = self.pool_mut(instance_type, zone) {
            pool.interruption_rate = Some(rate);
        }
        self
    }

    pub fn with_rate_band(mut self, instance_type: &str, zone: &str, band: RateBand) -> Self {
        if let Some(pool) = self.pool_mut(instance_type, zone) {
            pool.rate_band = Some(band);
        }
        self
    }

    pub fn with_signal(mut self, instance_id: &str, signal: Signal) -> Self {
        self.signals.insert(instance_id.to_string(), signal);
        self
    }

    /// Signal returned for instances without an explicit entry.
    pub fn with_default_signal(mut self, signal: Signal) -> Self {
        self.default_signal = signal;
        self
    }

    pub fn with_fault(mut self, fault: MockFault) -> Self {
        self.faults.insert(fault);
        self
    }

    /// Delay every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Provider calls served so far, across clones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn catalog(&self) -> &CatalogDataset {
        &self.catalog
    }

    fn pool_mut(&mut self, instance_type: &str, zone: &str) -> Option<&mut CatalogPool> {
        self.catalog
            .pools
            .iter_mut()
            .find(|p| p.instance_type == instance_type && p.zone == zone)
    }

    async fn enter(&self, capability: MockFault) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.faults.contains(&capability) {
            return Err(ProviderError::Unavailable(format!(
                "injected {capability:?} fault"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceProvider for MockProviders {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_price(&self, instance_type: &str, zone: &str) -> ProviderResult<PriceQuote> {
        self.enter(MockFault::Price).await?;
        self.catalog.price(instance_type, zone)
    }

    async fn list_pools(&self, region: &str) -> ProviderResult<Vec<PoolQuote>> {
        self.enter(MockFault::Price).await?;
        Ok(self.catalog.pools_in(region))
    }
}

#[async_trait]
impl SpecsProvider for MockProviders {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_specs(&self, instance_type: &str) -> ProviderResult<InstanceSpecs> {
        self.enter(MockFault::Specs).await?;
        self.catalog.specs(instance_type)
    }
}

#[async_trait]
impl ReliabilityProvider for MockProviders {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_interruption_rate(
        &self,
        instance_type: &str,
        zone: &str,
    ) -> ProviderResult<Option<f64>> {
        self.enter(MockFault::Reliability).await?;
        Ok(self.catalog.interruption_rate(instance_type, zone))
    }
}

#[async_trait]
impl SignalProvider for MockProviders {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn check_signal(&self, instance_id: &str) -> ProviderResult<Signal> {
        self.enter(MockFault::Signal).await?;
        Ok(self
            .signals
            .get(instance_id)
            .copied()
            .unwrap_or(self.default_signal))
    }
}
