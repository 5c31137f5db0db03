//! Pipeline orchestrator.
//!
//! Stages run strictly in registration order over one context. Before
//! each stage the context is checkpointed:
//!
//! - success → keep the new state, trace `ok`
//! - failure of an ordinary stage → restore the checkpoint, trace
//!   `degraded`, continue
//! - failure of a safety-critical stage → restore, trace `aborted`, force
//!   the conservative decision and go straight to the actuator
//!
//! Past the deadline only safety-critical stages and the actuator run.
//! Before the actuator the decision is settled and the invariants are
//! checked; a violation is treated like a safety-critical failure.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use spotgrid_core::{
    Candidate, ConfigError, Decision, EvaluationRequest, Signal, ValidatedConfig, ValidationError,
};
use spotgrid_providers::ProviderSet;
use spotgrid_risk::RiskModel;

use crate::actuator::Actuator;
use crate::context::{EvaluationContext, StageOutcome, TraceEntry};
use crate::decision::{DecisionState, conservative_decision, resolve_predictive};
use crate::error::PipelineError;
use crate::stage::{Stage, StageKind};
use crate::stages::{
    ActuatorStage, BinPacking, CostRanking, HardwareFilter, HistoricalFilter, InputAdapter,
    RightsizingExpander, RiskStage, SafetyGate, SignalOverride, input,
};

/// What callers outside the pipeline get to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub final_decision: Decision,
    pub decision_reason: String,
    pub aws_signal: Signal,
    pub candidates_evaluated: usize,
    pub candidates_valid: usize,
    pub selected_candidate: Option<Candidate>,
    pub execution_time_ms: f64,
}

pub struct Pipeline {
    config: Arc<ValidatedConfig>,
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Pipeline {
    /// Check the stage list against the configuration.
    ///
    /// Stages must appear in canonical [`StageKind`] order, once each, with
    /// an input adapter first and the actuator last. Every optional stage
    /// is present exactly when its enable flag is set.
    pub fn new(
        config: Arc<ValidatedConfig>,
        stages: Vec<Box<dyn Stage>>,
    ) -> Result<Self, ConfigError> {
        validate_stages(&config, &stages)?;
        debug!(
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "pipeline assembled"
        );
        Ok(Self { config, stages })
    }

    /// Assemble the canonical stage list from the enable flags.
    pub fn from_config(
        config: Arc<ValidatedConfig>,
        providers: ProviderSet,
        risk_model: Arc<dyn RiskModel>,
        actuator: Arc<dyn Actuator>,
    ) -> Result<Self, ConfigError> {
        let flags = config.stages.clone();
        let thresholds = config.thresholds.clone();
        let ranking = config.ranking.clone();

        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(InputAdapter::new(
            config.input.kind,
            providers.clone(),
        ))];
        if flags.hardware_filter {
            stages.push(Box::new(HardwareFilter));
        }
        if flags.historical_filter {
            stages.push(Box::new(HistoricalFilter::new(
                providers.clone(),
                thresholds.max_interruption_rate,
            )));
        }
        if flags.rightsizing {
            stages.push(Box::new(RightsizingExpander::new(
                providers.clone(),
                flags
                    .historical_filter
                    .then_some(thresholds.max_interruption_rate),
            )));
        }
        if flags.risk_model {
            stages.push(Box::new(RiskStage::new(
                risk_model,
                providers.policy.timeout,
                config.risk.fallback_probability,
            )));
        }
        if flags.safety_gate {
            stages.push(Box::new(SafetyGate::new(
                thresholds.max_crash_probability,
                flags.risk_model,
            )));
        }
        if flags.bin_packing {
            stages.push(Box::new(BinPacking::new(ranking.waste_weight)));
        }
        if flags.cost_ranking {
            stages.push(Box::new(CostRanking::new(
                ranking.top_n,
                ranking.min_improvement,
                flags.risk_model,
            )));
        }
        if flags.signal_override {
            stages.push(Box::new(SignalOverride::new(providers)));
        }
        stages.push(Box::new(ActuatorStage::new(actuator)));

        Self::new(config, stages)
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Validate a request and open a context for it.
    pub fn context(&self, request: EvaluationRequest) -> Result<EvaluationContext, ValidationError> {
        request.validate()?;
        input::check_mode(self.config.input.kind, request.mode)?;
        Ok(EvaluationContext::new(request, self.config.execution_budget()))
    }

    /// Validate `request`, then [`execute`](Self::execute) it.
    pub async fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> Result<EvaluationContext, ValidationError> {
        let ctx = self.context(request)?;
        Ok(self.execute(ctx).await)
    }

    /// Run every stage over `ctx`. Always returns a context holding a
    /// final decision and reason.
    pub async fn execute(&self, mut ctx: EvaluationContext) -> EvaluationContext {
        info!(
            mode = %ctx.request.mode,
            region = %ctx.request.region,
            instance_id = ctx.request.current.as_ref().map_or("-", |c| c.instance_id.as_str()),
            "evaluation started"
        );

        let (actuator, stages) = match self.stages.split_last() {
            Some((last, rest)) if last.kind() == StageKind::Actuator => (Some(last), rest),
            _ => (None, self.stages.as_slice()),
        };

        let mut aborted = false;
        for stage in stages {
            if ctx.deadline_exceeded() && !stage.kind().runs_past_deadline() {
                warn!(stage = stage.name(), "deadline passed, stage skipped");
                record(&mut ctx, stage.name(), Instant::now(), StageOutcome::Skipped, None);
                continue;
            }

            let checkpoint = ctx.clone();
            let started = Instant::now();
            match stage.process(&mut ctx).await {
                Ok(()) => {
                    let note = ctx.take_note();
                    let degradation = ctx.take_degradation();
                    let outcome = match &degradation {
                        Some(reason) => {
                            warn!(stage = stage.name(), %reason, "stage fell back to conservative defaults");
                            StageOutcome::Degraded
                        }
                        None => StageOutcome::Ok,
                    };
                    let mut entry = entry(stage.name(), started, outcome, degradation);
                    entry.note = note;
                    ctx.trace.push(entry);
                    debug!(
                        stage = stage.name(),
                        valid = ctx.valid_count(),
                        state = ?ctx.state,
                        "stage finished"
                    );
                }
                Err(e) if stage.kind().is_safety_critical() => {
                    ctx = checkpoint;
                    error!(stage = stage.name(), error = %e, "safety-critical stage failed");
                    record(
                        &mut ctx,
                        stage.name(),
                        started,
                        StageOutcome::Aborted,
                        Some(e.to_string()),
                    );
                    abort(&mut ctx, &format!("{} failed: {e}", stage.name()));
                    aborted = true;
                    break;
                }
                Err(e) => {
                    ctx = checkpoint;
                    warn!(stage = stage.name(), error = %e, "stage degraded, changes discarded");
                    record(
                        &mut ctx,
                        stage.name(),
                        started,
                        StageOutcome::Degraded,
                        Some(e.to_string()),
                    );
                }
            }
        }

        if !aborted {
            let settled = resolve_predictive(&mut ctx)
                .map_err(|e| PipelineError::SafetyViolation(e.to_string()))
                .and_then(|()| self.verify_invariants(&ctx));
            if let Err(e) = settled {
                error!(error = %e, "invariant check failed");
                abort(&mut ctx, &e.to_string());
            }
        }

        if let Some(actuator) = actuator {
            let started = Instant::now();
            let outcome = match actuator.process(&mut ctx).await {
                Ok(()) => (StageOutcome::Ok, None),
                Err(e) => {
                    warn!(stage = actuator.name(), error = %e, "actuator stage failed");
                    (StageOutcome::Degraded, Some(e.to_string()))
                }
            };
            record(&mut ctx, actuator.name(), started, outcome.0, outcome.1);
        }

        ctx.elapsed = Some(ctx.started_at.elapsed());
        info!(
            decision = ?ctx.state,
            reason = %ctx.reason,
            signal = %ctx.signal,
            evaluated = ctx.candidates.len(),
            valid = ctx.valid_count(),
            elapsed_ms = ctx.execution_time().as_millis() as u64,
            "evaluation finished"
        );
        ctx
    }

    /// Reduce a finished context to what callers need.
    pub fn get_execution_summary(ctx: &EvaluationContext) -> ExecutionSummary {
        ExecutionSummary {
            final_decision: ctx
                .decision()
                .unwrap_or_else(|| conservative_decision(ctx.request.mode)),
            decision_reason: ctx.reason.clone(),
            aws_signal: ctx.signal,
            candidates_evaluated: ctx.candidates.len(),
            candidates_valid: ctx.valid_count(),
            selected_candidate: ctx.selected_candidate().cloned(),
            execution_time_ms: ctx.execution_time().as_secs_f64() * 1000.0,
        }
    }

    fn verify_invariants(&self, ctx: &EvaluationContext) -> Result<(), PipelineError> {
        let violation = |msg: String| Err(PipelineError::SafetyViolation(msg));

        if ctx.decision().is_none() {
            return violation("no final decision".into());
        }
        match (ctx.state, ctx.selected_candidate()) {
            (DecisionState::Switch, None) => {
                return violation("SWITCH without a selected candidate".into());
            }
            (state, Some(_)) if state != DecisionState::Switch => {
                return violation(format!("candidate selected for {state:?}"));
            }
            _ => {}
        }
        if let Some(c) = ctx.candidates.iter().find(|c| c.valid == c.rejection.is_some()) {
            return violation(format!("{} is inconsistently rejected", c.pool_key()));
        }

        let flags = &self.config.stages;
        if flags.safety_gate && !ctx.gate_applied {
            return violation("safety gate did not run".into());
        }
        if let Some(selected) = ctx.selected_candidate() {
            if !selected.valid {
                return violation(format!("selected {} is rejected", selected.pool_key()));
            }
            if flags.safety_gate {
                let max = self.config.thresholds.max_crash_probability;
                match selected.crash_probability {
                    Some(p) if p > max => {
                        return violation(format!(
                            "selected {} has crash probability {p} above {max}",
                            selected.pool_key()
                        ));
                    }
                    None if flags.risk_model => {
                        return violation(format!("selected {} was never scored", selected.pool_key()));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

fn entry(
    stage: &'static str,
    started: Instant,
    outcome: StageOutcome,
    error: Option<String>,
) -> TraceEntry {
    TraceEntry {
        stage,
        duration: started.elapsed(),
        outcome,
        error,
        note: None,
    }
}

fn record(
    ctx: &mut EvaluationContext,
    stage: &'static str,
    started: Instant,
    outcome: StageOutcome,
    error: Option<String>,
) {
    ctx.trace.push(entry(stage, started, outcome, error));
}

/// Force the conservative decision for the request mode.
fn abort(ctx: &mut EvaluationContext, cause: &str) {
    let decision = match ctx.signal {
        Signal::Termination => Decision::Evacuate,
        _ => conservative_decision(ctx.request.mode),
    };
    ctx.force(decision, format!("conservative {decision}: {cause}"));
    ctx.recommendations.clear();
}

fn validate_stages(config: &ValidatedConfig, stages: &[Box<dyn Stage>]) -> Result<(), ConfigError> {
    let kinds: Vec<StageKind> = stages.iter().map(|s| s.kind()).collect();

    match (kinds.first(), kinds.last()) {
        (Some(StageKind::Input), Some(StageKind::Actuator)) if kinds.len() >= 2 => {}
        _ => {
            return Err(ConfigError::StageOrder(
                "an input adapter must come first and the actuator last".into(),
            ));
        }
    }
    if let Some(pair) = kinds.windows(2).find(|w| w[0] >= w[1]) {
        return Err(ConfigError::StageOrder(format!(
            "{:?} cannot follow {:?}",
            pair[1], pair[0]
        )));
    }

    let present: HashSet<StageKind> = kinds.iter().copied().collect();
    let flags = &config.stages;
    let expected = [
        (StageKind::HardwareFilter, flags.hardware_filter),
        (StageKind::HistoricalFilter, flags.historical_filter),
        (StageKind::Rightsizing, flags.rightsizing),
        (StageKind::RiskModel, flags.risk_model),
        (StageKind::SafetyGate, flags.safety_gate),
        (StageKind::BinPacking, flags.bin_packing),
        (StageKind::CostRanking, flags.cost_ranking),
        (StageKind::SignalOverride, flags.signal_override),
    ];
    for (kind, enabled) in expected {
        match (enabled, present.contains(&kind)) {
            (true, false) => {
                return Err(ConfigError::StageOrder(format!("{kind:?} is enabled but missing")));
            }
            (false, true) => {
                return Err(ConfigError::StageOrder(format!("{kind:?} is disabled but present")));
            }
            _ => {}
        }
    }
    Ok(())
}
