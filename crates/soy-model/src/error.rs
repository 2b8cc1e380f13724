use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown trigger: {0}")]
    UnknownTrigger(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
