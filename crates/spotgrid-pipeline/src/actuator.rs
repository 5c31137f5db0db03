//! Realizing a decision.
//!
//! The pipeline never mutates infrastructure itself. Its last stage hands
//! the decision to an [`Actuator`]: the reference implementation logs it,
//! [`RecordingActuator`] keeps it in memory, and [`CallbackActuator`]
//! forwards it to an external collaborator.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use spotgrid_core::{ActuatorKind, ConfigError, Decision, EvaluationMode, Signal};

/// What the actuator is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuationRequest {
    pub decision: Decision,
    pub reason: String,
    pub mode: EvaluationMode,
    pub signal: Signal,
    /// Running instance, single-instance mode only.
    pub instance_id: Option<String>,
    /// `{instance_type}@{zone}` of the selected pool, `Switch` only.
    pub target: Option<String>,
    /// Ranked pool keys, best first.
    pub recommendations: Vec<String>,
}

/// What happened when the decision was handed over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuationReport {
    pub actuator: &'static str,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActuationReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("actuator unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

#[async_trait]
pub trait Actuator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, request: &ActuationRequest) -> Result<(), ActuatorError>;
}

/// Logs the decision at `info`.
#[derive(Debug, Clone, Default)]
pub struct LoggingActuator;

#[async_trait]
impl Actuator for LoggingActuator {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn apply(&self, request: &ActuationRequest) -> Result<(), ActuatorError> {
        info!(
            decision = %request.decision,
            reason = %request.reason,
            signal = %request.signal,
            instance_id = request.instance_id.as_deref().unwrap_or("-"),
            target = request.target.as_deref().unwrap_or("-"),
            recommendations = ?request.recommendations,
            "decision"
        );
        Ok(())
    }
}

/// Keeps every request in memory. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    log: Arc<Mutex<Vec<ActuationRequest>>>,
    fail: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record requests but report every one as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ActuationRequest> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<ActuationRequest> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn apply(&self, request: &ActuationRequest) -> Result<(), ActuatorError> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if self.fail {
            return Err(ActuatorError::Unavailable("recording actuator set to fail".into()));
        }
        Ok(())
    }
}

pub type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Callback invoked with every decision.
pub type ActuationCallback = Box<dyn Fn(ActuationRequest) -> BoxFuture + Send + Sync>;

/// Forwards decisions to an external collaborator.
pub struct CallbackActuator {
    callback: ActuationCallback,
}

impl CallbackActuator {
    pub fn new(callback: ActuationCallback) -> Self {
        Self { callback }
    }

    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ActuationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(Box::new(move |request| -> BoxFuture { Box::pin(f(request)) }))
    }
}

#[async_trait]
impl Actuator for CallbackActuator {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn apply(&self, request: &ActuationRequest) -> Result<(), ActuatorError> {
        (self.callback)(request.clone()).await?;
        Ok(())
    }
}

/// Build the actuator selected by `actuator.kind`. `external` needs the
/// callback supplied by the embedding application.
pub fn actuator_from_config(
    kind: ActuatorKind,
    callback: Option<ActuationCallback>,
) -> Result<Arc<dyn Actuator>, ConfigError> {
    match kind {
        ActuatorKind::Logging => Ok(Arc::new(LoggingActuator)),
        ActuatorKind::Recording => Ok(Arc::new(RecordingActuator::new())),
        ActuatorKind::External => {
            let callback = callback.ok_or_else(|| {
                ConfigError::invalid("actuator.kind", "external actuator needs a callback")
            })?;
            Ok(Arc::new(CallbackActuator::new(callback)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request(decision: Decision) -> ActuationRequest {
        ActuationRequest {
            decision,
            reason: "test".into(),
            mode: EvaluationMode::SingleInstance,
            signal: Signal::None,
            instance_id: Some("i-0abc".into()),
            target: None,
            recommendations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn recording_keeps_every_request() {
        let actuator = RecordingActuator::new();
        let shared = actuator.clone();
        actuator.apply(&request(Decision::Stay)).await.unwrap();
        actuator.apply(&request(Decision::Drain)).await.unwrap();
        assert_eq!(shared.requests().len(), 2);
        assert_eq!(shared.last().unwrap().decision, Decision::Drain);
    }

    #[tokio::test]
    async fn callback_receives_decision() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let actuator = CallbackActuator::from_fn(move |req| {
            let seen = seen.clone();
            async move {
                assert_eq!(req.decision, Decision::Evacuate);
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        actuator.apply(&request(Decision::Evacuate)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_errors_surface() {
        let actuator =
            CallbackActuator::from_fn(|_| async { Err(anyhow::anyhow!("detach refused")) });
        let err = actuator.apply(&request(Decision::Switch)).await.unwrap_err();
        assert!(err.to_string().contains("detach refused"));
    }

    #[test]
    fn external_requires_callback() {
        assert!(actuator_from_config(ActuatorKind::External, None).is_err());
        assert_eq!(
            actuator_from_config(ActuatorKind::Logging, None).unwrap().name(),
            "logging"
        );
    }
}
