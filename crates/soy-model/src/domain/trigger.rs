use std::{fmt, str::FromStr};

use crate::error::ModelError;

/// Reason an Execution was created; stored in the triggered-by annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggeredBy {
    /// The parent had no Execution yet.
    Create,
    /// The parent's generation moved past the one stamped on its last Execution.
    SpecChange,
    /// The drift-detection interval elapsed.
    Drift,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::Create => "create",
            TriggeredBy::SpecChange => "spec-change",
            TriggeredBy::Drift => "drift",
        }
    }
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggeredBy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "spec-change" => Ok(Self::SpecChange),
            "drift" => Ok(Self::Drift),
            _ => Err(ModelError::UnknownTrigger(s.to_string())),
        }
    }
}
