//! spotgrid-pipeline — the spot decision pipeline.
//!
//! ```text
//! input → hardware → historical → rightsizing → risk → safety gate
//!       → bin-packing → ranking → signal override → actuator
//! ```
//!
//! One [`EvaluationContext`] per request flows through the stages in
//! order. The safety gate and the signal override are safety-critical:
//! if either fails the evaluation ends with the conservative decision
//! (EVACUATE for a running instance, REJECT for a pool search). Any
//! other failing stage is rolled back and recorded as degraded.

pub mod actuator;
pub mod context;
pub mod decision;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod stages;

#[cfg(test)]
pub(crate) mod test_support;

pub use actuator::{
    ActuationCallback, ActuationReport, ActuationRequest, Actuator, ActuatorError,
    CallbackActuator, LoggingActuator, RecordingActuator, actuator_from_config,
};
pub use context::{EvaluationContext, StageOutcome, TraceEntry};
pub use decision::{DecisionState, TransitionError, conservative_decision, resolve_predictive};
pub use error::{PipelineError, StageError};
pub use pipeline::{ExecutionSummary, Pipeline};
pub use stage::{Stage, StageKind};
