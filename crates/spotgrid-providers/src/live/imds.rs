//! Interruption signals from the EC2 instance metadata service.
//!
//! IMDS only answers for the instance it runs on, so the provider first
//! checks that the requested instance id is the local one. Signals:
//!
//! - `spot/instance-action` returns 200 once a termination (or stop /
//!   hibernate) notice is issued, 404 otherwise.
//! - `events/recommendations/rebalance` returns 200 once a rebalance
//!   recommendation is issued, 404 otherwise.
//!
//! An IMDSv2 session token is requested first; if the token endpoint is
//! unavailable the provider falls back to IMDSv1 requests.

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use spotgrid_core::Signal;

use crate::error::{ProviderError, ProviderResult};
use crate::live::client::{self, HttpResponse};
use crate::traits::SignalProvider;

const TOKEN_PATH: &str = "/latest/api/token";
const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const INSTANCE_ACTION_PATH: &str = "/latest/meta-data/spot/instance-action";
const REBALANCE_PATH: &str = "/latest/meta-data/events/recommendations/rebalance";

const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";

/// Body of `spot/instance-action`.
#[derive(Debug, Deserialize)]
pub struct InstanceAction {
    pub action: String,
    pub time: String,
}

pub struct ImdsSignalProvider {
    /// `host:port` of the metadata service.
    address: String,
}

impl ImdsSignalProvider {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    fn uri(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    async fn token(&self) -> Option<String> {
        let uri = self.uri(TOKEN_PATH);
        match client::send(Method::PUT, &uri, &[(TOKEN_TTL_HEADER, "60")]).await {
            Ok(resp) if resp.status.is_success() => Some(resp.text()),
            Ok(resp) => {
                debug!(status = %resp.status, "imds token unavailable, using IMDSv1");
                None
            }
            Err(e) => {
                debug!(error = %e, "imds token request failed, using IMDSv1");
                None
            }
        }
    }

    async fn fetch(&self, path: &str, token: Option<&str>) -> ProviderResult<HttpResponse> {
        let uri = self.uri(path);
        match token {
            Some(token) => client::send(Method::GET, &uri, &[(TOKEN_HEADER, token)]).await,
            None => client::get(&uri).await,
        }
    }

    /// `Some` on 200, `None` on 404, error on anything else.
    async fn flag(&self, path: &str, token: Option<&str>) -> ProviderResult<Option<HttpResponse>> {
        let resp = self.fetch(path, token).await?;
        match resp.status {
            StatusCode::OK => Ok(Some(resp)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ProviderError::Status {
                status: status.as_u16(),
                uri: self.uri(path),
            }),
        }
    }
}

#[async_trait]
impl SignalProvider for ImdsSignalProvider {
    fn name(&self) -> &'static str {
        "imds"
    }

    async fn check_signal(&self, instance_id: &str) -> ProviderResult<Signal> {
        let token = self.token().await;
        let token = token.as_deref();

        let local = self.fetch(INSTANCE_ID_PATH, token).await?;
        let local = client::expect_success(local, &self.uri(INSTANCE_ID_PATH))?.text();
        if local != instance_id {
            return Err(ProviderError::Unavailable(format!(
                "metadata service belongs to {local}, not {instance_id}"
            )));
        }

        if let Some(resp) = self.flag(INSTANCE_ACTION_PATH, token).await? {
            match resp.json::<InstanceAction>() {
                Ok(action) => warn!(
                    %instance_id,
                    action = %action.action,
                    time = %action.time,
                    "spot interruption notice"
                ),
                Err(e) => warn!(%instance_id, error = %e, "spot interruption notice with unreadable body"),
            }
            return Ok(Signal::Termination);
        }

        if self.flag(REBALANCE_PATH, token).await?.is_some() {
            warn!(%instance_id, "rebalance recommendation");
            return Ok(Signal::Rebalance);
        }

        Ok(Signal::None)
    }
}
