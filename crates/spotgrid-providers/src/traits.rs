//! Provider interfaces.

use async_trait::async_trait;

use spotgrid_core::{InstanceSpecs, PoolQuote, PriceQuote, Signal};

use crate::error::ProviderResult;

/// Spot and on-demand prices per pool.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_price(&self, instance_type: &str, zone: &str) -> ProviderResult<PriceQuote>;

    /// Every priced pool in a region.
    async fn list_pools(&self, region: &str) -> ProviderResult<Vec<PoolQuote>>;
}

/// Hardware description per instance type.
#[async_trait]
pub trait SpecsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_specs(&self, instance_type: &str) -> ProviderResult<InstanceSpecs>;
}

/// Historical interruption frequency per pool.
#[async_trait]
pub trait ReliabilityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Interruption rate in 0.0..=1.0, `None` when the source has no data
    /// for the pool.
    async fn get_interruption_rate(
        &self,
        instance_type: &str,
        zone: &str,
    ) -> ProviderResult<Option<f64>>;
}

/// Live interruption notices for a running instance.
#[async_trait]
pub trait SignalProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check_signal(&self, instance_id: &str) -> ProviderResult<Signal>;
}
