//! Decision state machine.
//!
//! ```text
//!              ┌──────────► Stay ─────┐
//! Evaluating ──┼──────────► Switch ───┼──► Drain     (REBALANCE)
//!              └──────────► Reject    └──► Evacuate  (TERMINATION, from any state)
//! ```
//!
//! Predictive transitions leave `Evaluating` exactly once. Signals may
//! override any predictive outcome; `Evacuate` and `Reject` are terminal
//! except that a termination notice still upgrades `Reject` to
//! `Evacuate`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spotgrid_core::{Decision, EvaluationMode, Signal};

use crate::context::EvaluationContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    #[default]
    Evaluating,
    Stay,
    Switch,
    Drain,
    Evacuate,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decision transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: DecisionState,
    pub to: DecisionState,
}

impl DecisionState {
    pub fn decision(&self) -> Option<Decision> {
        match self {
            DecisionState::Evaluating => None,
            DecisionState::Stay => Some(Decision::Stay),
            DecisionState::Switch => Some(Decision::Switch),
            DecisionState::Drain => Some(Decision::Drain),
            DecisionState::Evacuate => Some(Decision::Evacuate),
            DecisionState::Reject => Some(Decision::Reject),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DecisionState::Evacuate | DecisionState::Reject)
    }

    /// Leave `Evaluating` with a predictive outcome (`Stay`, `Switch`,
    /// `Reject`, or `Evacuate` when the running instance itself failed).
    pub fn conclude(self, decision: Decision) -> Result<DecisionState, TransitionError> {
        let to = DecisionState::from(decision);
        match (self, decision) {
            (
                DecisionState::Evaluating,
                Decision::Stay | Decision::Switch | Decision::Reject | Decision::Evacuate,
            ) => Ok(to),
            _ => Err(TransitionError { from: self, to }),
        }
    }

    /// Apply a live signal. `None` leaves the state unchanged.
    pub fn on_signal(self, signal: Signal) -> DecisionState {
        match signal {
            Signal::None => self,
            Signal::Termination => DecisionState::Evacuate,
            Signal::Rebalance if self.is_terminal() => self,
            Signal::Rebalance => DecisionState::Drain,
        }
    }
}

impl From<Decision> for DecisionState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Stay => DecisionState::Stay,
            Decision::Switch => DecisionState::Switch,
            Decision::Drain => DecisionState::Drain,
            Decision::Evacuate => DecisionState::Evacuate,
            Decision::Reject => DecisionState::Reject,
        }
    }
}

/// Decision taken when the evaluation cannot be trusted.
pub fn conservative_decision(mode: EvaluationMode) -> Decision {
    match mode {
        EvaluationMode::SingleInstance => Decision::Evacuate,
        EvaluationMode::PoolSearch => Decision::Reject,
    }
}

/// Settle a context that is still `Evaluating` from what the stages left
/// behind. No-op once a decision exists.
///
/// - a selected candidate → `Switch`
/// - no valid candidate and the running instance failed the safety gate
///   → `Evacuate`
/// - no valid candidate after the safety gate ran → `Reject`
/// - otherwise → `Stay`
pub fn resolve_predictive(ctx: &mut EvaluationContext) -> Result<(), TransitionError> {
    if ctx.state != DecisionState::Evaluating {
        return Ok(());
    }

    if let Some(selected) = ctx.selected_candidate() {
        let reason = format!(
            "switch to {} (yield {:.4})",
            selected.pool_key(),
            selected.yield_score.unwrap_or_default()
        );
        return ctx.conclude(Decision::Switch, reason);
    }

    if ctx.valid_count() == 0 {
        if ctx.request.mode == EvaluationMode::SingleInstance
            && let Some(rejection) = ctx.current().and_then(|c| c.rejection.as_ref())
            && rejection.stage == crate::stages::safety_gate::STAGE
        {
            let reason = format!("current instance failed the safety gate: {}", rejection.reason);
            return ctx.conclude(Decision::Evacuate, reason);
        }
        if ctx.gate_applied {
            let reason = format!(
                "no candidate cleared the safety gate ({} evaluated)",
                ctx.candidates.len()
            );
            return ctx.conclude(Decision::Reject, reason);
        }
        return ctx.conclude(Decision::Stay, "no candidate to compare against");
    }

    ctx.conclude(Decision::Stay, "no better candidate found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictive_outcomes_leave_evaluating_once() {
        let stay = DecisionState::Evaluating.conclude(Decision::Stay).unwrap();
        assert_eq!(stay, DecisionState::Stay);
        assert_eq!(
            stay.conclude(Decision::Switch),
            Err(TransitionError {
                from: DecisionState::Stay,
                to: DecisionState::Switch,
            })
        );
        assert!(DecisionState::Evaluating.conclude(Decision::Drain).is_err());
    }

    #[test]
    fn termination_wins_from_every_state() {
        for state in [
            DecisionState::Evaluating,
            DecisionState::Stay,
            DecisionState::Switch,
            DecisionState::Drain,
            DecisionState::Evacuate,
            DecisionState::Reject,
        ] {
            assert_eq!(state.on_signal(Signal::Termination), DecisionState::Evacuate);
            assert_eq!(state.on_signal(Signal::None), state);
        }
    }

    #[test]
    fn rebalance_drains_non_terminal_states() {
        assert_eq!(DecisionState::Stay.on_signal(Signal::Rebalance), DecisionState::Drain);
        assert_eq!(DecisionState::Switch.on_signal(Signal::Rebalance), DecisionState::Drain);
        assert_eq!(
            DecisionState::Reject.on_signal(Signal::Rebalance),
            DecisionState::Reject
        );
        assert_eq!(
            DecisionState::Evacuate.on_signal(Signal::Rebalance),
            DecisionState::Evacuate
        );
    }

    #[test]
    fn conservative_by_mode() {
        assert_eq!(
            conservative_decision(EvaluationMode::SingleInstance),
            Decision::Evacuate
        );
        assert_eq!(conservative_decision(EvaluationMode::PoolSearch), Decision::Reject);
    }
}
