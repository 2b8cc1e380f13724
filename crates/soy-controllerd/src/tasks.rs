//! Supervised task specs run by the daemon.
//!
//! Every long-running loop is a taskvisor task with `RestartPolicy::Always`:
//! a controller whose watch stream closes, or a server that loses its
//! listener, is restarted with backoff instead of taking the process down.
use std::{net::SocketAddr, time::Duration};

use axum::Router;
use soy_core::{Context, Manager, ManagerConfig, Reconciler};
use soy_settings::SettingsStore;
use taskvisor::{BackoffPolicy, JitterPolicy, RestartPolicy, TaskError, TaskFn, TaskRef, TaskSpec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SETTINGS_REFRESH_TASK: &str = "soy-settings-refresh";
pub const HTTP_TASK: &str = "soy-http";

/// First restart delay after a task attempt fails.
const RESTART_FIRST: Duration = Duration::from_secs(1);
const RESTART_MAX: Duration = Duration::from_secs(60);

fn restart_backoff(success_delay: Option<Duration>) -> BackoffPolicy {
    BackoffPolicy {
        success_delay,
        first: RESTART_FIRST,
        max: RESTART_MAX,
        jitter: JitterPolicy::Equal,
        factor: 2.0,
    }
}

/// One controller loop. Each attempt builds a fresh [`Manager`], so a
/// restart starts from a full resync.
pub fn controller<R>(name: &'static str, reconciler: R, ctx: Context, config: ManagerConfig) -> TaskSpec
where
    R: Reconciler + Clone,
{
    let task: TaskRef = TaskFn::arc(name, move |cancel: CancellationToken| {
        let manager = Manager::new(reconciler.clone(), &ctx, config);
        async move {
            match manager.run(cancel.clone()).await {
                Ok(()) if cancel.is_cancelled() => Err(TaskError::Canceled),
                Ok(()) => Ok(()),
                Err(e) => Err(TaskError::Fail {
                    reason: e.to_string(),
                }),
            }
        }
    });
    TaskSpec::new(task, RestartPolicy::Always, restart_backoff(None), None)
}

/// Out-of-band settings reload every `interval`, covering edits the file
/// watcher missed. A failed reload keeps the last good snapshot and is
/// retried with the normal backoff.
pub fn settings_refresh(store: SettingsStore, interval: Duration) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(SETTINGS_REFRESH_TASK, move |cancel: CancellationToken| {
        let store = store.clone();
        async move {
            if cancel.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            match store.reload() {
                Ok(()) => {
                    debug!("settings refreshed");
                    Ok(())
                }
                Err(e) => Err(TaskError::Fail {
                    reason: format!("settings refresh failed: {e}"),
                }),
            }
        }
    });
    TaskSpec::new(
        task,
        RestartPolicy::Always,
        restart_backoff(Some(interval)),
        None,
    )
}

/// HTTP server for `/metrics` and `/healthz`, shut down gracefully on cancel.
pub fn http(addr: SocketAddr, router: Router) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(HTTP_TASK, move |cancel: CancellationToken| {
        let router = router.clone();
        async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| TaskError::Fail {
                    reason: format!("bind {addr}: {e}"),
                })?;
            info!(%addr, "http server listening");

            let shutdown = cancel.clone();
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .map_err(|e| {
                    warn!(error = %e, "http server failed");
                    TaskError::Fail {
                        reason: e.to_string(),
                    }
                })?;

            if cancel.is_cancelled() {
                Err(TaskError::Canceled)
            } else {
                Ok(())
            }
        }
    });
    TaskSpec::new(task, RestartPolicy::Always, restart_backoff(None), None)
}
