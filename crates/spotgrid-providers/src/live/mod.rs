//! Live providers backed by remote HTTP endpoints.

pub mod advisor;
pub mod client;
pub mod imds;
pub mod price_feed;

pub use advisor::{AdvisorDataset, SpotAdvisorProvider};
pub use imds::ImdsSignalProvider;
pub use price_feed::HttpPriceProvider;
