//! Rightsizing expander.
//!
//! With a vcpu band on the request, oversized pools inside the band join
//! the collection tagged [`Fit::Rightsized`]. They pass through the same
//! hardware check and reliability lookup as everything else before they
//! are added, so the expander cannot smuggle in an unfiltered candidate.

use async_trait::async_trait;
use tracing::debug;

use spotgrid_core::{Candidate, Fit};
use spotgrid_providers::ProviderSet;

use crate::context::EvaluationContext;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};
use crate::stages::historical::{lookup_rates, report_lookups};
use crate::stages::hardware;
use crate::stages::input::enumerate_pools;

pub const STAGE: &str = "rightsizing";

pub struct RightsizingExpander {
    providers: ProviderSet,
    /// Interruption ceiling, when the historical filter is enabled.
    max_rate: Option<f64>,
}

impl RightsizingExpander {
    pub fn new(providers: ProviderSet, max_rate: Option<f64>) -> Self {
        Self {
            providers,
            max_rate,
        }
    }
}

#[async_trait]
impl Stage for RightsizingExpander {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::Rightsizing
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let req = ctx.request.requirements.clone();
        let Some(band) = req.vcpu_band else {
            debug!("no vcpu band, nothing to expand");
            return Ok(());
        };

        let region = ctx.request.region.clone();
        let pools = enumerate_pools(&self.providers, &region).await?;

        let mut added: Vec<Candidate> = Vec::new();
        for (pool, spec) in pools {
            let Ok(spec) = spec else { continue };
            if spec.vcpu <= req.vcpu || !band.contains(spec.vcpu) {
                continue;
            }
            if ctx.contains_pool(&pool.instance_type, &pool.zone) {
                continue;
            }
            let mut candidate = Candidate::new(pool.instance_type, pool.zone, pool.price, &spec)
                .with_fit(Fit::Rightsized);
            if let Err(reason) = hardware::check(&candidate, &req) {
                candidate.reject(STAGE, reason);
            }
            added.push(candidate);
        }

        if let Some(max_rate) = self.max_rate {
            let pending: Vec<usize> = (0..added.len()).filter(|&i| added[i].valid).collect();
            let keys: Vec<(String, String)> = pending
                .iter()
                .map(|&i| (added[i].instance_type.clone(), added[i].zone.clone()))
                .collect();
            let lookups = lookup_rates(&self.providers, &keys).await;
            for (&i, lookup) in pending.iter().zip(&lookups) {
                added[i].interruption_rate = Some(lookup.rate());
                if let Some(reason) = lookup.rejection(max_rate) {
                    added[i].reject(STAGE, reason);
                }
            }
            report_lookups(ctx, &lookups);
        }

        debug!(
            band_min = band.min,
            band_max = band.max,
            added = added.len(),
            valid = added.iter().filter(|c| c.valid).count(),
            "rightsizing candidates added"
        );
        ctx.candidates.extend(added);
        Ok(())
    }
}
