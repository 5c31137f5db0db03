//! Cost ranking.
//!
//! ```text
//! yield = savings · (1 − crash_probability) − waste_cost − PRICE_WEIGHT · spot / scale
//! ```
//!
//! `scale` is the highest spot price among the valid candidates. Savings
//! are measured against on-demand, or against `scale` for pools without
//! an on-demand price. The price term keeps a cheaper pool ahead even when
//! savings alone cannot tell two pools apart.
//!
//! Highest yield first; ties go to the lower interruption rate, then to
//! the lexically smaller instance type, then zone. The order depends only
//! on candidate values, never on the order lookups completed in.

use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::debug;

use spotgrid_core::{Candidate, EvaluationMode, RateBand};

use crate::context::EvaluationContext;
use crate::decision::resolve_predictive;
use crate::error::StageError;
use crate::stage::{Stage, StageKind};

pub const STAGE: &str = "cost_ranking";

pub struct CostRanking {
    top_n: usize,
    min_improvement: f64,
    /// Unscored candidates count as certain to crash when a model ran.
    risk_enabled: bool,
}

impl CostRanking {
    pub fn new(top_n: usize, min_improvement: f64, risk_enabled: bool) -> Self {
        Self {
            top_n,
            min_improvement,
            risk_enabled,
        }
    }
}

pub const PRICE_WEIGHT: f64 = 0.01;

/// Highest positive spot price in the set, or 1.0 when there is none.
pub fn price_scale<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> f64 {
    let max = candidates
        .into_iter()
        .map(|c| c.spot_price)
        .filter(|p| p.is_finite())
        .fold(0.0_f64, f64::max);
    if max > 0.0 { max } else { 1.0 }
}

pub fn yield_score(candidate: &Candidate, unscored_risk: f64, price_scale: f64) -> f64 {
    let risk = candidate.crash_probability.unwrap_or(unscored_risk);
    candidate.savings_against(price_scale) * (1.0 - risk)
        - candidate.waste_cost.unwrap_or(0.0)
        - PRICE_WEIGHT * candidate.spot_price / price_scale
}

/// Best first. Expects `yield_score` to be set.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    let unknown = RateBand::CONSERVATIVE.representative_rate();
    let ya = a.yield_score.unwrap_or(f64::NEG_INFINITY);
    let yb = b.yield_score.unwrap_or(f64::NEG_INFINITY);
    yb.total_cmp(&ya)
        .then_with(|| {
            a.interruption_rate
                .unwrap_or(unknown)
                .total_cmp(&b.interruption_rate.unwrap_or(unknown))
        })
        .then_with(|| a.instance_type.cmp(&b.instance_type))
        .then_with(|| a.zone.cmp(&b.zone))
}

#[async_trait]
impl Stage for CostRanking {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn kind(&self) -> StageKind {
        StageKind::CostRanking
    }

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError> {
        let unscored_risk = if self.risk_enabled { 1.0 } else { 0.0 };
        let mut ranked = ctx.valid_indices();
        let scale = price_scale(ranked.iter().map(|&i| &ctx.candidates[i]));
        for &i in &ranked {
            let score = yield_score(&ctx.candidates[i], unscored_risk, scale);
            ctx.candidates[i].yield_score = Some(score);
        }
        ranked.sort_by(|&a, &b| rank_order(&ctx.candidates[a], &ctx.candidates[b]));
        ctx.recommendations = ranked.iter().take(self.top_n).copied().collect();

        if let Some(&top) = ranked.first() {
            let best = &ctx.candidates[top];
            let best_yield = best.yield_score.unwrap_or(f64::NEG_INFINITY);
            ctx.selected = match ctx.request.mode {
                EvaluationMode::PoolSearch => Some(top),
                EvaluationMode::SingleInstance if best.is_current => None,
                EvaluationMode::SingleInstance => {
                    let current_yield = ctx
                        .current()
                        .filter(|c| c.valid)
                        .and_then(|c| c.yield_score);
                    current_yield
                        .is_none_or(|y| best_yield > y + self.min_improvement)
                        .then_some(top)
                }
            };
            debug!(
                top = %best.pool_key(),
                yield_score = best_yield,
                ranked = ranked.len(),
                "candidates ranked"
            );
        }

        resolve_predictive(ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionState;
    use crate::test_support::{candidate, pool_request, single_request};
    use spotgrid_core::{Decision, Fit};
    use std::time::Duration;

    fn priced(instance_type: &str, spot: f64, od: f64) -> Candidate {
        let mut c = candidate(instance_type, 2, 4.0);
        c.spot_price = spot;
        c.on_demand_price = Some(od);
        c.crash_probability = Some(0.1);
        c.interruption_rate = Some(0.075);
        c
    }

    #[tokio::test]
    async fn pool_search_selects_top_yield() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![
            priced("m5.large", 0.05, 0.1),
            priced("c5.large", 0.02, 0.1),
            priced("r5.large", 0.03, 0.1),
        ];
        CostRanking::new(2, 0.0, true).process(&mut ctx).await.unwrap();

        assert_eq!(ctx.state, DecisionState::Switch);
        assert_eq!(ctx.selected_candidate().unwrap().instance_type, "c5.large");
        assert_eq!(ctx.recommendations, vec![1, 2]);
    }

    #[tokio::test]
    async fn ties_break_on_history_then_name() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        ctx.candidates = vec![
            priced("m5.large", 0.03, 0.1),
            priced("c5.large", 0.03, 0.1),
            priced("a1.large", 0.03, 0.1),
        ];
        ctx.candidates[2].interruption_rate = Some(0.125);
        CostRanking::new(3, 0.0, true).process(&mut ctx).await.unwrap();
        assert_eq!(ctx.recommendations, vec![1, 0, 2]);
    }

    #[tokio::test]
    async fn waste_is_charged_against_yield() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        let mut big = priced("c5.xlarge", 0.01, 0.1).with_fit(Fit::Rightsized);
        big.waste_cost = Some(1.0);
        ctx.candidates = vec![big, priced("m5.large", 0.05, 0.1)];
        CostRanking::new(1, 0.0, true).process(&mut ctx).await.unwrap();
        assert_eq!(ctx.selected_candidate().unwrap().instance_type, "m5.large");
    }

    #[tokio::test]
    async fn single_instance_stays_without_a_better_alternative() {
        let mut ctx = EvaluationContext::new(single_request(), Duration::from_secs(5));
        let current = priced("c5.large", 0.035, 0.085).as_current();
        let mut worse = priced("c5.xlarge", 0.08, 0.17).with_fit(Fit::Rightsized);
        worse.waste_cost = Some(1.0);
        ctx.candidates = vec![current, worse];

        CostRanking::new(3, 0.0, true).process(&mut ctx).await.unwrap();
        assert_eq!(ctx.decision(), Some(Decision::Stay));
        assert_eq!(ctx.selected, None);
    }

    #[tokio::test]
    async fn single_instance_switches_past_min_improvement() {
        let mut ctx = EvaluationContext::new(single_request(), Duration::from_secs(5));
        let current = priced("c5.large", 0.05, 0.1).as_current();
        ctx.candidates = vec![current, priced("c6i.large", 0.02, 0.1)];

        let mut strict = ctx.clone();
        CostRanking::new(3, 0.5, true).process(&mut strict).await.unwrap();
        assert_eq!(strict.decision(), Some(Decision::Stay));

        CostRanking::new(3, 0.1, true).process(&mut ctx).await.unwrap();
        assert_eq!(ctx.decision(), Some(Decision::Switch));
        assert_eq!(ctx.selected_candidate().unwrap().instance_type, "c6i.large");
    }

    #[test]
    fn cheaper_is_better_all_else_equal() {
        let a = priced("a.large", 0.02, 0.1);
        let b = priced("b.large", 0.04, 0.1);
        assert!(yield_score(&a, 1.0, 0.04) > yield_score(&b, 1.0, 0.04));
    }

    #[tokio::test]
    async fn price_decides_without_on_demand() {
        let mut ctx = EvaluationContext::new(pool_request(None), Duration::from_secs(5));
        let mut dear = priced("c5.large", 0.09, 0.1);
        let mut cheap = priced("m5.large", 0.01, 0.1);
        dear.on_demand_price = None;
        cheap.on_demand_price = None;
        ctx.candidates = vec![dear, cheap];

        CostRanking::new(2, 0.0, true).process(&mut ctx).await.unwrap();
        assert_eq!(ctx.selected_candidate().unwrap().instance_type, "m5.large");
        assert_eq!(ctx.recommendations, vec![1, 0]);
    }

    #[test]
    fn price_counts_above_on_demand() {
        let a = priced("a.large", 0.12, 0.1);
        let b = priced("b.large", 0.15, 0.1);
        let scale = price_scale([&a, &b]);
        assert_eq!(scale, 0.15);
        assert!(yield_score(&a, 1.0, scale) > yield_score(&b, 1.0, scale));
    }
}
