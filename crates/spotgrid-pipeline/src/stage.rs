//! The stage interface.

use async_trait::async_trait;
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::error::StageError;

/// What a stage does, in canonical pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Input,
    HardwareFilter,
    HistoricalFilter,
    Rightsizing,
    RiskModel,
    SafetyGate,
    BinPacking,
    CostRanking,
    SignalOverride,
    Actuator,
}

impl StageKind {
    /// A failure of this stage aborts to the conservative decision.
    pub fn is_safety_critical(&self) -> bool {
        matches!(self, StageKind::SafetyGate | StageKind::SignalOverride)
    }

    /// Runs even after the deadline has passed.
    pub fn runs_past_deadline(&self) -> bool {
        self.is_safety_critical() || *self == StageKind::Actuator
    }
}

/// One step of the pipeline. Stages read and annotate the context in
/// place; returning an error hands control back to the orchestrator.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> StageKind;

    async fn process(&self, ctx: &mut EvaluationContext) -> Result<(), StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_stages_survive_the_deadline() {
        assert!(StageKind::SafetyGate.runs_past_deadline());
        assert!(StageKind::SignalOverride.runs_past_deadline());
        assert!(StageKind::Actuator.runs_past_deadline());
        assert!(!StageKind::Actuator.is_safety_critical());
        assert!(!StageKind::CostRanking.runs_past_deadline());
        assert!(StageKind::RiskModel < StageKind::SafetyGate);
    }
}
