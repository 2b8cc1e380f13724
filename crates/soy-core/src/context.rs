use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use soy_settings::ExecutionDefaults;

use crate::{
    client::Client,
    metrics::{MetricsHandle, noop_metrics},
};

/// Source of "now" for status timestamps and drift timers.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Dependencies shared by every controller.
#[derive(Clone)]
pub struct Context {
    client: Client,
    settings: Arc<dyn ExecutionDefaults>,
    metrics: MetricsHandle,
    clock: Arc<dyn Clock>,
}

impl Context {
    /// Context with no-op metrics and the system clock.
    pub fn new(client: Client, settings: Arc<dyn ExecutionDefaults>) -> Self {
        Self {
            client,
            settings,
            metrics: noop_metrics(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[inline]
    pub fn settings(&self) -> &dyn ExecutionDefaults {
        self.settings.as_ref()
    }

    #[inline]
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
