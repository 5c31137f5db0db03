//! spotgrid-providers — the data sources the decision pipeline consults.
//!
//! Each concern sits behind a narrow async trait so stages never know
//! where their data comes from:
//!
//! ```text
//! ProviderSet
//!   ├── PriceProvider        get_price / list_pools
//!   ├── SpecsProvider        get_specs
//!   ├── ReliabilityProvider  get_interruption_rate
//!   └── SignalProvider       check_signal
//! ```
//!
//! Implementations come in three flavours, chosen once by
//! [`ProviderFactory`] from the configuration:
//!
//! - **mock**: in-memory fixtures with fault and latency injection
//! - **static**: a JSON catalog file, loaded once per process
//! - **live**: HTTP sources (price feed, Spot Instance Advisor, EC2 IMDS)
//!
//! Every call made by a stage goes through [`call_with_retry`], which
//! bounds each attempt with a timeout and retries once after a backoff.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod factory;
pub mod live;
pub mod mock;
pub mod retry;
pub mod static_catalog;
pub mod traits;

pub use cache::{DatasetCache, SharedState};
pub use catalog::{CatalogDataset, CatalogPool};
pub use error::{ProviderError, ProviderResult};
pub use factory::{ProviderFactory, ProviderSet};
pub use mock::{MockFault, MockProviders};
pub use retry::{CallPolicy, call_with_retry};
pub use static_catalog::StaticCatalogProvider;
pub use traits::{PriceProvider, ReliabilityProvider, SignalProvider, SpecsProvider};
