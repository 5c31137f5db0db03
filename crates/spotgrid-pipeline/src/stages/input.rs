//! Input adapters: build the initial candidate collection.
//!
//! Single-instance mode resolves the running instance into one candidate.
//! Pool-search mode enumerates every priced pool in the region and keeps
//! the ones sized exactly for the request; oversized pools are left to
//! the rightsizing expander.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use spotgrid_core::{
    Candidate, EvaluationMode, InputKind, InstanceSpecs, PoolQuote, ValidationError,
};
use spotgrid_providers::{ProviderResult, ProviderSet, call_with_retry};

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "input";

pub struct InputAdapter {
    kind: InputKind,
    providers: ProviderSet,
}

impl InputAdapter {
    pub fn new(kind: InputKind, providers: ProviderSet) -> Self {
        Self { kind, providers }
    }

    async fn single_instance(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let current = ctx
            .request
            .current
            .clone()
            .ok_or(ValidationError::Missing("current"))?;
        let policy = self.providers.policy;
        let prices = self.providers.price.as_ref();
        let specs = self.providers.specs.as_ref();
        let instance_type = current.instance_type.as_str();
        let zone = current.zone.as_str();

        let (price, spec) = tokio::join!(
            call_with_retry(policy, "get_price", move || prices.get_price(instance_type, zone)),
            call_with_retry(policy, "get_specs", move || specs.get_specs(instance_type)),
        );

        let candidate = match (price, spec) {
            (Ok(price), Ok(spec)) => Candidate::new(instance_type, zone, price, &spec),
            (Err(e), _) => {
                warn!(instance_type, zone, error = %e, "current instance price unavailable");
                ctx.degrade("current instance price unavailable");
                Candidate::unresolved(instance_type, zone, STAGE, format!("price_unavailable: {e}"))
            }
            (_, Err(e)) => {
                warn!(instance_type, error = %e, "current instance specs unavailable");
                ctx.degrade("current instance specs unavailable");
                Candidate::unresolved(instance_type, zone, STAGE, format!("specs_unavailable: {e}"))
            }
        };
        ctx.candidates.push(candidate.as_current());
        Ok(())
    }

    async fn pool_search(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let region = ctx.request.region.clone();
        let wanted = ctx.request.requirements.vcpu;
        let pools = enumerate_pools(&self.providers, &region).await?;
        let listed = pools.len();

        let mut unresolved = 0;
        for (pool, spec) in pools {
            match spec {
                Ok(spec) if spec.vcpu == wanted => ctx.candidates.push(Candidate::new(
                    pool.instance_type,
                    pool.zone,
                    pool.price,
                    &spec,
                )),
                Ok(_) => {}
                Err(e) => {
                    unresolved += 1;
                    ctx.candidates.push(Candidate::unresolved(
                        pool.instance_type,
                        pool.zone,
                        STAGE,
                        format!("specs_unavailable: {e}"),
                    ));
                }
            }
        }
        if unresolved > 0 {
            ctx.degrade(format!("{unresolved} pool(s) without instance specs"));
        }
        debug!(
            region = %region,
            listed,
            candidates = ctx.candidates.len(),
            "pools enumerated"
        );
        Ok(())
    }
}

/// Check that the configured adapter can serve a request mode.
pub fn check_mode(kind: InputKind, mode: EvaluationMode) -> Result<(), ValidationError> {
    let ok = match kind {
        InputKind::Auto => true,
        InputKind::SingleInstance => mode == EvaluationMode::SingleInstance,
        InputKind::PoolSearch => mode == EvaluationMode::PoolSearch,
    };
    if ok {
        Ok(())
    } else {
        let adapter = match kind {
            InputKind::SingleInstance => "single_instance",
            _ => "pool_search",
        };
        Err(ValidationError::ModeMismatch {
            adapter: adapter.to_string(),
            mode: mode.to_string(),
        })
    }
}

/// Every priced pool in `region` with its specs, sorted by instance type
/// then zone. Specs are fetched once per instance type, concurrently.
pub(crate) async fn enumerate_pools(
    providers: &ProviderSet,
    region: &str,
) -> Result<Vec<(PoolQuote, ProviderResult<InstanceSpecs>)>, StageError> {
    let policy = providers.policy;
    let prices = providers.price.as_ref();
    let specs = providers.specs.as_ref();

    let mut pools = call_with_retry(policy, "list_pools", move || prices.list_pools(region))
        .await
        .map_err(|e| StageError::provider("list_pools", e))?;
    pools.sort_by(|a, b| {
        a.instance_type
            .cmp(&b.instance_type)
            .then_with(|| a.zone.cmp(&b.zone))
    });
    pools.dedup_by(|a, b| a.instance_type == b.instance_type && a.zone == b.zone);

    let types: BTreeSet<&str> = pools.iter().map(|p| p.instance_type.as_str()).collect();
    let lookups = types.into_iter().map(|instance_type| async move {
        let spec =
            call_with_retry(policy, "get_specs", move || specs.get_specs(instance_type)).await;
        (instance_type.to_string(), spec)
    });
    let resolved: HashMap<String, ProviderResult<InstanceSpecs>> =
        join_all(lookups).await.into_iter().collect();

    Ok(pools
        .into_iter()
        .map(|pool| {
            let spec = resolved.get(&pool.instance_type).cloned().unwrap_or_else(|| {
                Err(spotgrid_providers::ProviderError::NotFound(pool.instance_type.clone()))
            });
            (pool, spec)
        })
        .collect())
}

#[async_trait]
impl Stage for InputAdapter {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::Input
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        check_mode(self.kind, ctx.request.mode)?;
        match ctx.request.mode {
            EvaluationMode::SingleInstance => self.single_instance(ctx).await,
            EvaluationMode::PoolSearch => self.pool_search(ctx).await,
        }
    }
}
