use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Structured status detail, one entry per `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observed_generation: i64,
}

/// Insert or update `cond` in `conditions` keyed by type.
///
/// `last_transition_time` is only replaced when the status flips, so
/// re-applying an identical condition leaves the list untouched.
/// Returns `true` if the list changed.
pub fn set_condition(conditions: &mut Vec<Condition>, cond: Condition) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.type_ == cond.type_) else {
        conditions.push(cond);
        return true;
    };

    if existing.status != cond.status {
        *existing = cond;
        return true;
    }

    let mut changed = false;
    if existing.reason != cond.reason {
        existing.reason = cond.reason;
        changed = true;
    }
    if existing.message != cond.message {
        existing.message = cond.message;
        changed = true;
    }
    if existing.observed_generation != cond.observed_generation {
        existing.observed_generation = cond.observed_generation;
        changed = true;
    }
    changed
}
