use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model {name} could not be loaded: {reason}")]
    Load { name: String, reason: String },

    #[error("model artifact is malformed: {0}")]
    Artifact(String),

    #[error("prediction failed: {0}")]
    Predict(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
