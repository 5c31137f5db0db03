//! Live prices from an HTTP price feed.
//!
//! The feed exposes two JSON endpoints:
//!
//! - `GET {base}/v1/prices/{region}` → `[PoolQuote]`
//! - `GET {base}/v1/prices/{region}/{instance_type}/{zone}` → `PriceQuote`

use async_trait::async_trait;

use spotgrid_core::instance::region_of_zone;
use spotgrid_core::{PoolQuote, PriceQuote};

use crate::error::ProviderResult;
use crate::live::client;
use crate::traits::PriceProvider;

pub struct HttpPriceProvider {
    base_url: String,
}

impl HttpPriceProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceProvider for HttpPriceProvider {
    fn name(&self) -> &'static str {
        "price-feed"
    }

    async fn get_price(&self, instance_type: &str, zone: &str) -> ProviderResult<PriceQuote> {
        let uri = format!(
            "{}/v1/prices/{}/{instance_type}/{zone}",
            self.base_url,
            region_of_zone(zone)
        );
        let resp = client::expect_success(client::get(&uri).await?, &uri)?;
        resp.json()
    }

    async fn list_pools(&self, region: &str) -> ProviderResult<Vec<PoolQuote>> {
        let uri = format!("{}/v1/prices/{region}", self.base_url);
        let resp = client::expect_success(client::get(&uri).await?, &uri)?;
        resp.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::live::client::test_server::serve;

    #[tokio::test]
    async fn reads_quotes() {
        let pools = r#"[
            { "instance_type": "c5.large", "zone": "ap-south-1a", "spot_price": 0.035, "on_demand_price": 0.085 }
        ]"#;
        let quote = r#"{ "spot_price": 0.035, "on_demand_price": 0.085 }"#;
        let addr = serve(vec![
            ("GET", "/v1/prices/ap-south-1", 200, pools.to_string()),
            ("GET", "/v1/prices/ap-south-1/c5.large/ap-south-1a", 200, quote.to_string()),
        ])
        .await;

        let provider = HttpPriceProvider::new(format!("http://{addr}/"));
        let listed = provider.list_pools("ap-south-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].price.on_demand_price, Some(0.085));

        let price = provider.get_price("c5.large", "ap-south-1a").await.unwrap();
        assert_eq!(price.spot_price, 0.035);

        assert!(matches!(
            provider.get_price("m5.large", "ap-south-1a").await,
            Err(ProviderError::NotFound(_))
        ));
    }
}
