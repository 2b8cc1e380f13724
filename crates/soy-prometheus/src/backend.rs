use std::sync::Arc;

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry, proto::MetricFamily};

use soy_core::{MetricsBackend, ReconcileOutcome};
use soy_settings::{LoadStage, ReloadListener, SettingsError};

const NAMESPACE: &str = "soyplane";

/// Prometheus metrics backend for soyplane.
///
/// ## Label cardinality
/// All labels are bounded:
/// - `controller`: "execution", "module", "stack"
/// - `outcome`: "done", "requeue", "error"
/// - `kind`: "Job", "Execution"
/// - `stage`: "init", "watch", "reload"
#[derive(Clone)]
pub struct PrometheusMetrics {
    reconciles: CounterVec,
    reconcile_duration: HistogramVec,
    children_created: CounterVec,
    children_pruned: CounterVec,
    reload_failures: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a backend registering into `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let reconciles = CounterVec::new(
            Opts::new("reconcile_total", "Reconcile passes by outcome").namespace(NAMESPACE),
            &["controller", "outcome"],
        )?;
        registry.register(Box::new(reconciles.clone()))?;

        let reconcile_duration = HistogramVec::new(
            HistogramOpts::new(
                "reconcile_duration_seconds",
                "Wall time of one reconcile pass in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["controller"],
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        let children_created = CounterVec::new(
            Opts::new("children_created_total", "Child objects created by controllers")
                .namespace(NAMESPACE),
            &["controller", "kind"],
        )?;
        registry.register(Box::new(children_created.clone()))?;

        let children_pruned = CounterVec::new(
            Opts::new("children_pruned_total", "Stale child objects deleted by controllers")
                .namespace(NAMESPACE),
            &["controller", "kind"],
        )?;
        registry.register(Box::new(children_pruned.clone()))?;

        let reload_failures = CounterVec::new(
            Opts::new("settings_reload_failures_total", "Failed settings loads by stage")
                .namespace(NAMESPACE),
            &["stage"],
        )?;
        registry.register(Box::new(reload_failures.clone()))?;

        Ok(Self {
            reconciles,
            reconcile_duration,
            children_created,
            children_pruned,
            reload_failures,
            registry,
        })
    }

    /// Create a backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metrics for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_reconcile(&self, controller: &str, outcome: ReconcileOutcome, duration_ms: u64) {
        self.reconciles
            .with_label_values(&[controller, outcome.as_label()])
            .inc();

        let duration_seconds = duration_ms as f64 / 1000.0;
        self.reconcile_duration
            .with_label_values(&[controller])
            .observe(duration_seconds);
    }

    fn record_child_created(&self, controller: &str, kind: &str) {
        self.children_created
            .with_label_values(&[controller, kind])
            .inc();
    }

    fn record_child_pruned(&self, controller: &str, kind: &str) {
        self.children_pruned
            .with_label_values(&[controller, kind])
            .inc();
    }
}

impl ReloadListener for PrometheusMetrics {
    fn reload_failed(&self, stage: LoadStage, _err: &SettingsError) {
        self.reload_failures
            .with_label_values(&[stage.as_label()])
            .inc();
    }
}
