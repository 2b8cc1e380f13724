use soy_settings::SettingsError;
use thiserror::Error;

use crate::client::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("invalid resource {key}: {reason}")]
    InvalidResource { key: String, reason: String },

    #[error("controller stopped: {0}")]
    Stopped(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
