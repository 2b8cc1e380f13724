mod bootstrap;
mod http;
mod manifests;
mod tasks;

use std::sync::Arc;

use tracing::info;

use soy_core::{
    Context, ExecutionController, ManagerConfig, MetricsHandle, ModuleController, Reconciler,
    StackController, client::MemoryStore,
};
use soy_observe::{EventLogger, init_logger};
use soy_prometheus::PrometheusMetrics;
use soy_settings::{ReloadListenerHandle, SettingsStore};
use taskvisor::{Subscribe, Supervisor, SupervisorConfig};

use crate::{bootstrap::Bootstrap, http::HttpState};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) environment
    let boot = Bootstrap::from_env()?;

    // 2) metrics, registered before settings so init failures are counted
    let metrics = Arc::new(PrometheusMetrics::new()?);

    // 3) settings
    let listener: ReloadListenerHandle = metrics.clone();
    let settings = SettingsStore::new(boot.config_paths.clone()).with_listener(listener);
    settings.init(true)?;
    let snapshot = settings.snapshot()?;

    // 4) logger
    init_logger(&boot.logger_config(snapshot.logger.clone())?)?;
    info!(paths = ?settings.paths(), "settings loaded, logger initialized");

    // 5) store
    let store = MemoryStore::new();
    if let Some(dir) = &boot.manifests {
        manifests::load(dir, &store).await?;
    }

    // 6) controllers
    let handle: MetricsHandle = metrics.clone();
    let ctx = Context::new(store.client(), Arc::new(settings.clone())).with_metrics(handle);
    let config = ManagerConfig::default().with_workers(snapshot.controller.workers);

    let specs = vec![
        tasks::controller(
            ExecutionController::name(),
            ExecutionController::new(ctx.clone()),
            ctx.clone(),
            config,
        ),
        tasks::controller(
            ModuleController::name(),
            ModuleController::new(ctx.clone()),
            ctx.clone(),
            config,
        ),
        tasks::controller(
            StackController::name(),
            StackController::new(ctx.clone()),
            ctx,
            config,
        ),
        tasks::settings_refresh(settings.clone(), snapshot.controller.refresh_interval),
        tasks::http(
            boot.metrics_addr,
            http::router(HttpState { metrics, settings }),
        ),
    ];

    // 7) supervisor
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(EventLogger)];
    let sup = Supervisor::builder(SupervisorConfig::default())
        .with_subscribers(subscribers)
        .build();

    info!(tasks = specs.len(), "soyplane controllers starting");
    sup.run(specs)
        .await
        .map_err(|e| anyhow::anyhow!("supervisor exited: {e}"))?;
    info!("soyplane controllers stopped");
    Ok(())
}
