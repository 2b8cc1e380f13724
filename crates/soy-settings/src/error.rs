use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings not loaded")]
    NotLoaded,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("settings validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("failed to watch settings: {0}")]
    Watch(String),

    #[error("settings state poisoned")]
    Poisoned,
}

pub type SettingsResult<T> = Result<T, SettingsError>;
