//! Typed provider selection.
//!
//! The configuration names one [`ProviderSource`] per capability. The
//! factory resolves those selectors once, when the pipeline is built;
//! stages only ever see trait objects.

use std::sync::Arc;

use tracing::debug;

use spotgrid_core::config::ProvidersConfig;
use spotgrid_core::{ConfigError, ProviderSource};

use crate::cache::SharedState;
use crate::live::{HttpPriceProvider, ImdsSignalProvider, SpotAdvisorProvider};
use crate::mock::MockProviders;
use crate::retry::CallPolicy;
use crate::static_catalog::StaticCatalogProvider;
use crate::traits::{PriceProvider, ReliabilityProvider, SignalProvider, SpecsProvider};

/// The four providers a pipeline consults, plus the call policy for them.
#[derive(Clone)]
pub struct ProviderSet {
    pub price: Arc<dyn PriceProvider>,
    pub specs: Arc<dyn SpecsProvider>,
    pub reliability: Arc<dyn ReliabilityProvider>,
    pub signal: Arc<dyn SignalProvider>,
    pub policy: CallPolicy,
}

impl ProviderSet {
    /// Every capability served by the same mock.
    pub fn from_mock(mock: MockProviders, policy: CallPolicy) -> Self {
        let mock = Arc::new(mock);
        Self {
            price: mock.clone(),
            specs: mock.clone(),
            reliability: mock.clone(),
            signal: mock,
            policy,
        }
    }

    pub fn with_signal(mut self, signal: Arc<dyn SignalProvider>) -> Self {
        self.signal = signal;
        self
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("price", &self.price.name())
            .field("specs", &self.specs.name())
            .field("reliability", &self.reliability.name())
            .field("signal", &self.signal.name())
            .field("policy", &self.policy)
            .finish()
    }
}

pub struct ProviderFactory<'a> {
    config: &'a ProvidersConfig,
    shared: SharedState,
    mock: Option<MockProviders>,
}

impl<'a> ProviderFactory<'a> {
    pub fn new(config: &'a ProvidersConfig, shared: SharedState) -> Self {
        Self {
            config,
            shared,
            mock: None,
        }
    }

    /// Fixture served for every capability configured as `mock`.
    /// Without one, mock providers start empty.
    pub fn with_mock(mut self, mock: MockProviders) -> Self {
        self.mock = Some(mock);
        self
    }

    pub fn build(self) -> Result<ProviderSet, ConfigError> {
        let mock = Arc::new(self.mock.clone().unwrap_or_default());
        let static_catalog = self.static_catalog()?;
        let advisor = self.advisor();

        let price: Arc<dyn PriceProvider> = match self.config.price {
            ProviderSource::Mock => mock.clone(),
            ProviderSource::Static => required(&static_catalog, "price")?,
            ProviderSource::Live => {
                let url = self.config.price_feed_url.as_deref().ok_or_else(|| {
                    ConfigError::Provider("live price provider needs price_feed_url".to_string())
                })?;
                Arc::new(HttpPriceProvider::new(url))
            }
        };

        let specs: Arc<dyn SpecsProvider> = match self.config.specs {
            ProviderSource::Mock => mock.clone(),
            ProviderSource::Static => required(&static_catalog, "specs")?,
            ProviderSource::Live => advisor.clone(),
        };

        let reliability: Arc<dyn ReliabilityProvider> = match self.config.reliability {
            ProviderSource::Mock => mock.clone(),
            ProviderSource::Static => required(&static_catalog, "reliability")?,
            ProviderSource::Live => advisor,
        };

        let signal: Arc<dyn SignalProvider> = match self.config.signal {
            ProviderSource::Mock => mock,
            ProviderSource::Static => {
                return Err(ConfigError::Provider(
                    "signal provider has no static source".to_string(),
                ));
            }
            ProviderSource::Live => {
                Arc::new(ImdsSignalProvider::new(self.config.imds_address.clone()))
            }
        };

        let set = ProviderSet {
            price,
            specs,
            reliability,
            signal,
            policy: CallPolicy::from_config(self.config),
        };
        debug!(providers = ?set, "providers selected");
        Ok(set)
    }

    fn static_catalog(&self) -> Result<Option<Arc<StaticCatalogProvider>>, ConfigError> {
        let wanted = [self.config.price, self.config.specs, self.config.reliability]
            .contains(&ProviderSource::Static);
        if !wanted {
            return Ok(None);
        }
        let path = self.config.catalog_path.clone().ok_or_else(|| {
            ConfigError::Provider("static providers need catalog_path".to_string())
        })?;
        Ok(Some(Arc::new(StaticCatalogProvider::new(
            path,
            self.shared.catalog.clone(),
        ))))
    }

    fn advisor(&self) -> Arc<SpotAdvisorProvider> {
        Arc::new(SpotAdvisorProvider::new(
            self.config.advisor_url.clone(),
            self.shared.advisor.clone(),
        ))
    }
}

fn required(
    provider: &Option<Arc<StaticCatalogProvider>>,
    capability: &str,
) -> Result<Arc<StaticCatalogProvider>, ConfigError> {
    provider.clone().ok_or_else(|| {
        ConfigError::Provider(format!("static {capability} provider has no catalog"))
    })
}
