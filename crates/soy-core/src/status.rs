//! Pure status derivation shared by the controllers.
use chrono::{DateTime, Utc};
use soy_model::{Action, Condition, ConditionStatus, JobStatus, Phase};

/// Condition type every kind reports.
pub const CONDITION_READY: &str = "Ready";

/// Phase of an Execution from the counters of its Job.
///
/// Priority is strict: `Failed`, then `Succeeded`, then `Running`, then
/// `Pending`. A Job with pods terminating or finished-but-uncounted is still
/// running.
pub fn derive_phase(status: &JobStatus) -> Phase {
    let terminating = status.terminating.is_some_and(|n| n > 0);
    let uncounted = status
        .uncounted_terminated_pods
        .as_ref()
        .is_some_and(|p| !p.is_empty());
    phase_from_counts(status.failed, status.succeeded, status.active, terminating || uncounted)
}

/// Total phase function over the raw counters.
pub fn phase_from_counts(failed: i32, succeeded: i32, active: i32, in_flight: bool) -> Phase {
    if failed > 0 {
        Phase::Failed
    } else if succeeded > 0 {
        Phase::Succeeded
    } else if active > 0 || in_flight {
        Phase::Running
    } else {
        Phase::Pending
    }
}

/// Human summary for an Execution, e.g. `Plan completed successfully`.
pub fn summary_for(phase: Phase, action: Action) -> String {
    let title = action.title();
    match phase {
        Phase::Succeeded => format!("{title} completed successfully"),
        Phase::Failed => format!("{title} failed"),
        Phase::Running => format!("{title} is running"),
        Phase::Pending => format!("{title} pending"),
    }
}

/// `Ready` condition for a phase.
///
/// `now` becomes the transition time; [`soy_model::set_condition`] only keeps
/// it when the status actually flips.
pub fn ready_condition(
    phase: Phase,
    message: impl Into<String>,
    generation: i64,
    now: DateTime<Utc>,
) -> Condition {
    let status = match phase {
        Phase::Succeeded => ConditionStatus::True,
        Phase::Failed => ConditionStatus::False,
        Phase::Pending | Phase::Running => ConditionStatus::Unknown,
    };
    Condition {
        type_: CONDITION_READY.to_string(),
        status,
        reason: phase.as_str().to_string(),
        message: message.into(),
        last_transition_time: Some(now),
        observed_generation: generation,
    }
}

#[cfg(test)]
mod tests {
    use soy_model::UncountedTerminatedPods;

    use super::*;

    #[test]
    fn priority_is_failed_succeeded_running_pending() {
        let cases = [
            ((1, 1, 1, true), Phase::Failed),
            ((0, 1, 1, true), Phase::Succeeded),
            ((0, 0, 1, false), Phase::Running),
            ((0, 0, 0, true), Phase::Running),
            ((0, 0, 0, false), Phase::Pending),
        ];
        for ((f, s, a, t), expected) in cases {
            assert_eq!(phase_from_counts(f, s, a, t), expected, "f={f} s={s} a={a} t={t}");
        }
    }

    #[test]
    fn phase_is_total_over_small_counters() {
        for f in 0..3 {
            for s in 0..3 {
                for a in 0..3 {
                    for t in [false, true] {
                        let phase = phase_from_counts(f, s, a, t);
                        if f > 0 {
                            assert_eq!(phase, Phase::Failed);
                        } else if s > 0 {
                            assert_eq!(phase, Phase::Succeeded);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn terminating_and_uncounted_mean_running() {
        let terminating = JobStatus {
            terminating: Some(1),
            ..Default::default()
        };
        assert_eq!(derive_phase(&terminating), Phase::Running);

        let zero = JobStatus {
            terminating: Some(0),
            uncounted_terminated_pods: Some(UncountedTerminatedPods::default()),
            ..Default::default()
        };
        assert_eq!(derive_phase(&zero), Phase::Pending);

        let uncounted = JobStatus {
            uncounted_terminated_pods: Some(UncountedTerminatedPods {
                succeeded: vec!["pod-uid".into()],
                failed: Vec::new(),
            }),
            ..Default::default()
        };
        assert_eq!(derive_phase(&uncounted), Phase::Running);
    }

    #[test]
    fn summaries_follow_action() {
        assert_eq!(summary_for(Phase::Succeeded, Action::Plan), "Plan completed successfully");
        assert_eq!(summary_for(Phase::Failed, Action::Apply), "Apply failed");
        assert_eq!(summary_for(Phase::Running, Action::Plan), "Plan is running");
        assert_eq!(summary_for(Phase::Pending, Action::Apply), "Apply pending");
    }

    #[test]
    fn ready_tracks_phase() {
        let now = Utc::now();
        assert_eq!(ready_condition(Phase::Succeeded, "", 1, now).status, ConditionStatus::True);
        assert_eq!(ready_condition(Phase::Failed, "", 1, now).status, ConditionStatus::False);
        let running = ready_condition(Phase::Running, "Plan is running", 3, now);
        assert_eq!(running.status, ConditionStatus::Unknown);
        assert_eq!(running.reason, "Running");
        assert_eq!(running.observed_generation, 3);
    }
}
