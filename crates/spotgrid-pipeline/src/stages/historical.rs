//! Historical-reliability filter.
//!
//! Unknown history is never read as "no interruptions": a pool without a
//! usable rate records the most conservative band and is excluded at any
//! threshold.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use spotgrid_core::RateBand;
use spotgrid_providers::{ProviderSet, call_with_retry};

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "historical_filter";
pub const REASON: &str = "interruption_rate_exceeded";
pub const NO_HISTORY: &str = "interruption_history_unavailable";

pub struct HistoricalFilter {
    providers: ProviderSet,
    max_rate: f64,
}

impl HistoricalFilter {
    pub fn new(providers: ProviderSet, max_rate: f64) -> Self {
        Self {
            providers,
            max_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RateLookup {
    Known(f64),
    /// The provider has no history for the pool.
    Missing,
    /// The call failed or returned a rate outside 0.0..=1.0.
    Failed,
}

impl RateLookup {
    /// Rate recorded on the candidate.
    pub(crate) fn rate(self) -> f64 {
        match self {
            RateLookup::Known(rate) => rate,
            RateLookup::Missing | RateLookup::Failed => {
                RateBand::CONSERVATIVE.representative_rate()
            }
        }
    }

    pub(crate) fn rejection(self, max_rate: f64) -> Option<String> {
        match self {
            RateLookup::Known(rate) if rate > max_rate => {
                Some(format!("{REASON}: {rate:.3} > {max_rate:.3}"))
            }
            RateLookup::Known(_) => None,
            RateLookup::Missing | RateLookup::Failed => Some(NO_HISTORY.to_string()),
        }
    }
}

/// Interruption rate per `(instance_type, zone)`, in input order.
pub(crate) async fn lookup_rates(
    providers: &ProviderSet,
    pools: &[(String, String)],
) -> Vec<RateLookup> {
    let policy = providers.policy;
    let reliability = providers.reliability.as_ref();

    let lookups = pools.iter().map(|(instance_type, zone)| async move {
        let (t, z) = (instance_type.as_str(), zone.as_str());
        match call_with_retry(policy, "get_interruption_rate", move || {
            reliability.get_interruption_rate(t, z)
        })
        .await
        {
            Ok(Some(rate)) if (0.0..=1.0).contains(&rate) => RateLookup::Known(rate),
            Ok(Some(rate)) => {
                warn!(instance_type = t, zone = z, rate, "interruption rate out of range");
                RateLookup::Failed
            }
            Ok(None) => {
                debug!(instance_type = t, zone = z, "no interruption history");
                RateLookup::Missing
            }
            Err(e) => {
                warn!(instance_type = t, zone = z, error = %e, "interruption rate lookup failed");
                RateLookup::Failed
            }
        }
    });

    join_all(lookups).await
}

/// Pools without history get a note; failed lookups degrade the stage.
pub(crate) fn report_lookups(ctx: &mut EvaluationContext, lookups: &[RateLookup]) {
    let missing = lookups.iter().filter(|l| **l == RateLookup::Missing).count();
    let failed = lookups.iter().filter(|l| **l == RateLookup::Failed).count();
    if missing > 0 {
        ctx.note(format!("{missing} pool(s) without history excluded"));
    }
    if failed > 0 {
        ctx.degrade(format!("{failed} interruption rate lookup(s) failed"));
    }
}

#[async_trait]
impl Stage for HistoricalFilter {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::HistoricalFilter
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let indices = ctx.valid_indices();
        let pools: Vec<(String, String)> = indices
            .iter()
            .map(|&i| {
                let c = &ctx.candidates[i];
                (c.instance_type.clone(), c.zone.clone())
            })
            .collect();

        let lookups = lookup_rates(&self.providers, &pools).await;

        for (&i, lookup) in indices.iter().zip(&lookups) {
            let candidate = &mut ctx.candidates[i];
            candidate.interruption_rate = Some(lookup.rate());
            if let Some(reason) = lookup.rejection(self.max_rate) {
                candidate.reject(STAGE, reason);
            }
        }
        report_lookups(ctx, &lookups);
        debug!(
            max_rate = self.max_rate,
            remaining = ctx.valid_count(),
            "historical filter applied"
        );
        Ok(())
    }
}
