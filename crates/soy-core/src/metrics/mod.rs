//! Metrics collection abstraction for the controllers.
//!
//! Backends (prometheus, ...) implement [`MetricsBackend`] and are injected
//! through [`crate::Context`]; the manager reports reconcile outcomes and the
//! controllers report child objects they create or prune.
mod backend;
pub use backend::{MetricsBackend, MetricsHandle, ReconcileOutcome};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
