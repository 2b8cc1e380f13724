//! Decisions about when a parent needs a new Execution.
//!
//! Everything here is pure: the controllers gather the inputs (stamped
//! generation, phase, timestamps) and act on the result.
use std::time::Duration;

use chrono::{DateTime, Utc};
use soy_model::{Execution, Phase, TriggeredBy};

/// Generation stamped on an Execution under `annotation`, if parseable.
pub fn stamped_generation(exec: &Execution, annotation: &str) -> Option<i64> {
    exec.metadata
        .annotation(annotation)
        .and_then(|v| v.trim().parse().ok())
}

/// What a parent knows about its current Execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed {
    /// Parent generation recorded when the Execution was created.
    pub stamped: Option<i64>,
    pub phase: Phase,
}

impl Observed {
    pub fn of(exec: &Execution, annotation: &str) -> Self {
        Self {
            stamped: stamped_generation(exec, annotation),
            phase: exec.status.phase,
        }
    }
}

/// Generation gate.
///
/// A new Execution is due when there is none, or when the current one is
/// terminal and was stamped with a generation other than `generation`. A
/// missing or unreadable stamp counts as different.
pub fn decide(current: Option<&Observed>, generation: i64) -> Option<TriggeredBy> {
    match current {
        None => Some(TriggeredBy::Create),
        Some(obs) if obs.phase.is_terminal() && obs.stamped != Some(generation) => {
            Some(TriggeredBy::SpecChange)
        }
        Some(_) => None,
    }
}

/// Result of a drift check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftCheck {
    /// Interval elapsed; run again.
    Due,
    /// Not yet; check again after the remaining time.
    Wait(Duration),
    /// Nothing to wait for: the current run is still in flight.
    Idle,
}

/// Drift timer for a terminal Execution that last ran at `last_run`.
pub fn drift_check(
    interval: Duration,
    phase: Phase,
    last_run: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DriftCheck {
    if !phase.is_terminal() {
        return DriftCheck::Idle;
    }
    // Clock skew can put `last_run` in the future; treat that as zero elapsed.
    let elapsed = (now - last_run).to_std().unwrap_or(Duration::ZERO);
    match interval.checked_sub(elapsed) {
        Some(remaining) if !remaining.is_zero() => DriftCheck::Wait(remaining),
        _ => DriftCheck::Due,
    }
}

/// Reference time for drift: when the Execution finished, else when it was created.
pub fn last_run(exec: &Execution) -> Option<DateTime<Utc>> {
    exec.status
        .execution
        .finished_at
        .or(exec.metadata.creation_timestamp)
}
