//! Per-request evaluation state.

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use spotgrid_core::{Candidate, Decision, EvaluationRequest, Signal};

use crate::actuator::ActuationReport;
use crate::decision::{DecisionState, TransitionError};

/// How a stage finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Ok,
    /// The stage failed and its changes were discarded, or it finished on
    /// conservative fallbacks and its changes were kept.
    Degraded,
    /// Not run because the deadline passed.
    Skipped,
    /// A safety-critical failure ended the evaluation.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub stage: &'static str,
    #[serde(rename = "duration_ms", serialize_with = "millis")]
    pub duration: Duration,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Detail a stage left while still succeeding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Everything one evaluation knows. Owned by a single task and mutated
/// stage by stage.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub request: EvaluationRequest,
    /// Every candidate ever considered, rejected ones included.
    pub candidates: Vec<Candidate>,
    /// Index into `candidates`; only set for `Switch`.
    pub selected: Option<usize>,
    /// Ranked indices into `candidates`, best first.
    pub recommendations: Vec<usize>,
    pub state: DecisionState,
    pub reason: String,
    pub signal: Signal,
    pub trace: Vec<TraceEntry>,
    pub started_at: Instant,
    pub deadline: Instant,
    /// Set once the safety gate has filtered the collection.
    pub gate_applied: bool,
    pub actuation: Option<ActuationReport>,
    /// Wall time of the finished evaluation.
    pub elapsed: Option<Duration>,
    pending_note: Option<String>,
    pending_degradation: Option<String>,
}

impl EvaluationContext {
    pub fn new(request: EvaluationRequest, budget: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            request,
            candidates: Vec::new(),
            selected: None,
            recommendations: Vec::new(),
            state: DecisionState::Evaluating,
            reason: String::new(),
            signal: Signal::None,
            trace: Vec::new(),
            started_at,
            deadline: started_at + budget,
            gate_applied: false,
            actuation: None,
            elapsed: None,
            pending_note: None,
            pending_degradation: None,
        }
    }

    pub fn valid(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.valid)
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// Valid candidates that carry a crash probability.
    pub fn scored(&self) -> impl Iterator<Item = &Candidate> {
        self.valid().filter(|c| c.crash_probability.is_some())
    }

    /// Indices of valid candidates.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.valid)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn current(&self) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.is_current)
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected.and_then(|i| self.candidates.get(i))
    }

    pub fn contains_pool(&self, instance_type: &str, zone: &str) -> bool {
        self.candidates
            .iter()
            .any(|c| c.instance_type == instance_type && c.zone == zone)
    }

    pub fn decision(&self) -> Option<Decision> {
        self.state.decision()
    }

    pub fn deadline_exceeded(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Final wall time once the evaluation finished, time so far before.
    pub fn execution_time(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started_at.elapsed())
    }

    /// Attach a note to the trace entry of the running stage.
    pub fn note(&mut self, note: impl Into<String>) {
        self.pending_note = Some(note.into());
    }

    pub(crate) fn take_note(&mut self) -> Option<String> {
        self.pending_note.take()
    }

    /// Mark the running stage degraded while keeping its changes.
    /// Repeated calls accumulate.
    pub fn degrade(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        match &mut self.pending_degradation {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(&reason);
            }
            None => self.pending_degradation = Some(reason),
        }
    }

    pub(crate) fn take_degradation(&mut self) -> Option<String> {
        self.pending_degradation.take()
    }

    /// Record a predictive conclusion.
    pub fn conclude(
        &mut self,
        decision: Decision,
        reason: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.state = self.state.conclude(decision)?;
        self.reason = reason.into();
        if decision != Decision::Switch {
            self.selected = None;
        }
        Ok(())
    }

    /// Apply a live signal on top of the current state. Returns whether
    /// the state changed.
    pub fn apply_signal(&mut self, signal: Signal) -> bool {
        self.signal = signal;
        let next = self.state.on_signal(signal);
        if next == self.state {
            return false;
        }
        self.state = next;
        self.selected = None;
        true
    }

    /// Overwrite whatever was decided with `decision`. Used for signals
    /// and conservative aborts, which outrank every predictive outcome.
    pub fn force(&mut self, decision: Decision, reason: impl Into<String>) {
        self.state = DecisionState::from(decision);
        self.reason = reason.into();
        if decision != Decision::Switch {
            self.selected = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotgrid_core::{
        Architecture, EvaluationMode, InstanceSpecs, PriceQuote, ResourceRequirements,
    };

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            mode: EvaluationMode::PoolSearch,
            region: "ap-south-1".into(),
            current: None,
            requirements: ResourceRequirements {
                vcpu: 2,
                memory_gib: 4.0,
                architecture: Architecture::X86_64,
                vcpu_band: None,
            },
        }
    }

    fn candidate(instance_type: &str) -> Candidate {
        Candidate::new(
            instance_type,
            "ap-south-1a",
            PriceQuote {
                spot_price: 0.03,
                on_demand_price: Some(0.1),
            },
            &InstanceSpecs {
                vcpu: 2,
                memory_gib: 4.0,
                architecture: Architecture::X86_64,
            },
        )
    }

    #[test]
    fn views_over_the_collection() {
        let mut ctx = EvaluationContext::new(request(), Duration::from_secs(30));
        ctx.candidates.push(candidate("c5.large"));
        ctx.candidates.push(candidate("m5.large"));
        ctx.candidates[1].reject("hardware_filter", "hardware_mismatch");
        ctx.candidates[0].crash_probability = Some(0.2);

        assert_eq!(ctx.valid_count(), 1);
        assert_eq!(ctx.valid_indices(), vec![0]);
        assert_eq!(ctx.scored().count(), 1);
        assert!(ctx.contains_pool("m5.large", "ap-south-1a"));
        assert!(!ctx.deadline_exceeded());
    }

    #[test]
    fn force_clears_selection() {
        let mut ctx = EvaluationContext::new(request(), Duration::from_secs(30));
        ctx.candidates.push(candidate("c5.large"));
        ctx.selected = Some(0);
        ctx.conclude(Decision::Switch, "cheaper").unwrap();
        assert_eq!(ctx.selected, Some(0));

        ctx.force(Decision::Drain, "rebalance");
        assert_eq!(ctx.decision(), Some(Decision::Drain));
        assert_eq!(ctx.selected, None);
    }

    #[test]
    fn zero_budget_is_already_late() {
        let ctx = EvaluationContext::new(request(), Duration::ZERO);
        assert!(ctx.deadline_exceeded());
    }
}
