//! Prometheus metrics backend for the soyplane controllers.
//!
//! [`PrometheusMetrics`] implements [`soy_core::MetricsBackend`] for the
//! reconcile loop and [`soy_settings::ReloadListener`] for settings reloads.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use soy_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! let handle: soy_core::MetricsHandle = metrics.clone();
//! let listener: soy_settings::ReloadListenerHandle = metrics.clone();
//! # let _ = (handle, listener);
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `soyplane_reconcile_total{controller, outcome}` - Counter
//! - `soyplane_reconcile_duration_seconds{controller}` - Histogram
//! - `soyplane_children_created_total{controller, kind}` - Counter
//! - `soyplane_children_pruned_total{controller, kind}` - Counter
//! - `soyplane_settings_reload_failures_total{stage}` - Counter
//!
//! ## HTTP Server
//! No `/metrics` endpoint is served from here; encode [`PrometheusMetrics::gather`]
//! with [`TextEncoder`] in the application's HTTP layer.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
