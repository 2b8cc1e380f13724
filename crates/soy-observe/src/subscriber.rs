//! Logs taskvisor supervisor events through `tracing`.
//!
//! The daemon supervises each controller loop as a taskvisor task; this
//! subscriber turns restarts, failures and shutdown into log records.

use async_trait::async_trait;
use taskvisor::{Event, EventKind, Subscribe};
use tracing::{debug, error, info, trace, warn};

/// Bounded queue for bursts of supervisor events; overflow drops events.
const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct EventLogger;

#[async_trait]
impl Subscribe for EventLogger {
    async fn on_event(&self, event: &Event) {
        let task = event.task.as_deref().unwrap_or("unknown");
        let reason = event.reason.as_deref().unwrap_or("");
        let attempt = event.attempt.unwrap_or(0);

        match event.kind {
            EventKind::TaskStarting => info!(task, attempt, "task starting"),
            EventKind::TaskStopped => debug!(task, "task stopped"),
            EventKind::TaskFailed => error!(task, attempt, reason, "task failed"),
            EventKind::TimeoutHit => warn!(task, "task hit its timeout"),
            EventKind::BackoffScheduled => debug!(
                task,
                attempt,
                delay_ms = event.delay_ms.unwrap_or(0),
                "next attempt scheduled"
            ),
            EventKind::ActorExhausted => warn!(task, reason, "restart policy exhausted"),
            EventKind::ActorDead => error!(task, reason, "task terminated permanently"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithinGrace => info!("all tasks stopped within grace period"),
            EventKind::GraceExceeded => warn!("grace period exceeded; some tasks did not stop"),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                error!(task, reason, "event subscriber failure")
            }
            _ => trace!(task, kind = ?event.kind, "supervisor event"),
        }
    }

    fn name(&self) -> &'static str {
        "soy-event-logger"
    }

    fn queue_capacity(&self) -> usize {
        QUEUE_CAPACITY
    }
}
