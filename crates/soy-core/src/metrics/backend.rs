use std::sync::Arc;

/// Result class of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; nothing scheduled.
    Done,
    /// Scheduled another pass after a delay.
    Requeue,
    /// Returned an error; retried with backoff.
    Error,
}

impl ReconcileOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Done => "done",
            ReconcileOutcome::Requeue => "requeue",
            ReconcileOutcome::Error => "error",
        }
    }
}

/// Backend metrics collection interface.
///
/// `controller` is always one of the static controller names
/// (`execution`, `module`, `stack`), keeping label cardinality bounded.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record the end of one reconcile pass.
    ///
    /// # Arguments
    /// - `controller`: controller name
    /// - `outcome`: how the pass ended
    /// - `duration_ms`: wall time of the pass in milliseconds
    fn record_reconcile(&self, controller: &str, outcome: ReconcileOutcome, duration_ms: u64);

    /// Record a child object created by a controller (Job, Execution).
    fn record_child_created(&self, controller: &str, kind: &str);

    /// Record a stale child deleted during pruning.
    fn record_child_pruned(&self, controller: &str, kind: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
