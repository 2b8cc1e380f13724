use std::time::Duration;

use serde::{Deserialize, Serialize};
use soy_observe::LoggerConfig;

use crate::error::{SettingsError, SettingsResult};

const DEFAULT_IMAGE: &str = "tofuutils/tenv:latest";
const DEFAULT_ENGINE: &str = "tofu";
const DEFAULT_WORKERS: usize = 4;
const MAX_WORKERS: usize = 256;

/// Root of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub execution: ExecutionSettings,
    pub controller: ControllerSettings,
    pub logger: LoggerConfig,
}

/// Defaults applied when an Execution leaves engine details unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionSettings {
    /// Image for Jobs whose Execution pins no engine version.
    pub default_image: String,
    /// Engine binary for Executions that name none.
    pub default_engine: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_image: DEFAULT_IMAGE.to_string(),
            default_engine: DEFAULT_ENGINE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerSettings {
    /// Concurrent reconciles per controller.
    pub workers: usize,
    /// Period of the out-of-band settings refresh.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            refresh_interval: Duration::from_secs(60),
        }
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> SettingsResult<()> {
        let image = self.execution.default_image.trim();
        if image.is_empty() {
            return Err(invalid("execution.defaultImage", "must not be empty"));
        }
        if image.chars().any(char::is_whitespace) {
            return Err(invalid("execution.defaultImage", "must not contain whitespace"));
        }
        if self.execution.default_engine.trim().is_empty() {
            return Err(invalid("execution.defaultEngine", "must not be empty"));
        }
        if self.controller.workers == 0 || self.controller.workers > MAX_WORKERS {
            return Err(invalid(
                "controller.workers",
                format!("must be within 1..={MAX_WORKERS}"),
            ));
        }
        if self.controller.refresh_interval < Duration::from_secs(1) {
            return Err(invalid("controller.refreshInterval", "must be at least 1s"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Validation {
        field,
        reason: reason.into(),
    }
}
