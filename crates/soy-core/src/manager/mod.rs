//! Dispatch loop that drives one [`Reconciler`].
//!
//! The manager turns watch events into keys, guarantees at most one
//! in-flight reconcile per key, and schedules requeues and error backoff.
mod queue;

use std::{sync::Arc, time::Duration};

use soy_model::{ObjectKey, Resource};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::{AbortHandle, JoinSet},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    client::{Client, WatchEvent},
    context::Context,
    controller::{Action, Reconciler},
    error::{CoreError, CoreResult},
    metrics::{MetricsHandle, ReconcileOutcome},
};
use queue::WorkQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Concurrent reconciles.
    pub workers: usize,
    /// First retry delay after an error; doubles per consecutive failure.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl ManagerConfig {
    /// Set the worker count; zero is raised to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Result of one pass, sent back to the loop.
struct Finished {
    key: ObjectKey,
    result: CoreResult<Action>,
    elapsed: Duration,
}

/// Aborts the inner reconcile when the worker task is dropped, so
/// shutting down the worker set never leaves a pass running detached.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives one [`Reconciler`] from the client's watch stream.
///
/// Built per run: [`Manager::run`] consumes it, so a restarted controller
/// starts from a fresh queue and a full resync.
pub struct Manager<R: Reconciler> {
    reconciler: Arc<R>,
    client: Client,
    metrics: MetricsHandle,
    config: ManagerConfig,
}

impl<R: Reconciler> Manager<R> {
    pub fn new(reconciler: R, ctx: &Context, config: ManagerConfig) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            client: ctx.client().clone(),
            metrics: ctx.metrics().clone(),
            config,
        }
    }

    /// Key of the object of kind `R::Object` an event concerns, if any.
    fn route(event: &WatchEvent) -> Option<ObjectKey> {
        if event.kind == R::Object::KIND {
            return Some(event.key.clone());
        }
        if !R::owns().contains(&event.kind) {
            return None;
        }
        event
            .owner
            .as_ref()
            .filter(|o| o.kind == R::Object::KIND)
            .map(|o| ObjectKey::new(event.key.namespace.as_str(), o.name.as_str()))
    }

    async fn resync(&self, queue: &mut WorkQueue) -> CoreResult<()> {
        let keys = self.reconciler.keys().await?;
        debug!(controller = R::name(), count = keys.len(), "resync");
        for key in keys {
            queue.push(key);
        }
        Ok(())
    }

    fn spawn(&self, tasks: &mut JoinSet<()>, key: ObjectKey, done: mpsc::UnboundedSender<Finished>) {
        let reconciler = self.reconciler.clone();
        tasks.spawn(async move {
            let started = Instant::now();
            let pass_key = key.clone();
            // Inner task so a panicking reconcile still reports back and frees its key.
            let pass = tokio::spawn(async move { reconciler.reconcile(&pass_key).await });
            let _abort = AbortOnDrop(pass.abort_handle());
            let result = match pass.await {
                Ok(result) => result,
                Err(e) => Err(CoreError::Stopped(format!("reconcile task failed: {e}"))),
            };
            let _ = done.send(Finished {
                key,
                result,
                elapsed: started.elapsed(),
            });
        });
    }

    fn schedule(&self, key: ObjectKey, after: Duration, tx: mpsc::UnboundedSender<ObjectKey>, cancel: CancellationToken) {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => {
                    let _ = tx.send(key);
                }
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Run until `cancel` fires.
    ///
    /// Loop order:
    /// 1. List every object of `R::Object` and enqueue it.
    /// 2. Start queued keys while fewer than `workers` passes are in flight;
    ///    a key is never reconciled twice at once.
    /// 3. Route watch events to keys. Events for a key that is running mark
    ///    it dirty, so it runs once more afterwards.
    /// 4. Apply each pass result: `Done` clears backoff, `Requeue(d)` fires
    ///    after `d`, an error retries after exponential backoff.
    ///
    /// On cancel, pending timers are dropped and in-flight passes aborted.
    /// Returns an error only when the initial listing fails or the watch
    /// stream closes.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use std::sync::Arc;
    ///
    /// use soy_core::{Context, Manager, ManagerConfig, ModuleController, client::MemoryStore};
    /// use soy_settings::{Settings, SettingsStore};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn demo() -> soy_core::CoreResult<()> {
    /// let store = MemoryStore::new();
    /// let settings = Arc::new(SettingsStore::from_settings(Settings::default()));
    /// let ctx = Context::new(store.client(), settings);
    ///
    /// let manager = Manager::new(
    ///     ModuleController::new(ctx.clone()),
    ///     &ctx,
    ///     ManagerConfig::default().with_workers(2),
    /// );
    /// manager.run(CancellationToken::new()).await
    /// # }
    /// ```
    pub async fn run(self, cancel: CancellationToken) -> CoreResult<()> {
        let name = R::name();
        let mut events = self.client.watch();
        let mut queue = WorkQueue::default();
        self.resync(&mut queue).await?;

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Finished>();
        let (delay_tx, mut delay_rx) = mpsc::unbounded_channel::<ObjectKey>();
        let timers = cancel.child_token();
        let mut tasks = JoinSet::new();
        info!(controller = name, workers = self.config.workers, "controller started");

        let result = loop {
            while queue.active() < self.config.workers {
                let Some(key) = queue.pop() else { break };
                self.spawn(&mut tasks, key, done_tx.clone());
            }

            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(key) = Self::route(&event) {
                            queue.push(key);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(controller = name, missed, "watch lagged, resyncing");
                        if let Err(e) = self.resync(&mut queue).await {
                            warn!(controller = name, error = %e, "resync failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        break Err(CoreError::Stopped(format!("{name}: watch stream closed")));
                    }
                },
                Some(finished) = done_rx.recv() => {
                    self.complete(&mut queue, finished, &delay_tx, &timers);
                }
                Some(key) = delay_rx.recv() => queue.push(key),
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        };

        timers.cancel();
        tasks.shutdown().await;
        info!(controller = name, "controller stopped");
        result
    }

    fn complete(
        &self,
        queue: &mut WorkQueue,
        finished: Finished,
        delay_tx: &mpsc::UnboundedSender<ObjectKey>,
        timers: &CancellationToken,
    ) {
        let Finished { key, result, elapsed } = finished;
        queue.finish(&key);

        let outcome = match result {
            Ok(Action::Done) => {
                queue.forget(&key);
                ReconcileOutcome::Done
            }
            Ok(Action::Requeue(after)) => {
                queue.forget(&key);
                if after.is_zero() {
                    queue.push(key.clone());
                } else {
                    self.schedule(key.clone(), after, delay_tx.clone(), timers.clone());
                }
                ReconcileOutcome::Requeue
            }
            Err(e) => {
                let after = queue.backoff(&key, self.config.backoff_base, self.config.backoff_max);
                warn!(controller = R::name(), %key, error = %e, retry_in = ?after, "reconcile failed");
                self.schedule(key.clone(), after, delay_tx.clone(), timers.clone());
                ReconcileOutcome::Error
            }
        };

        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_reconcile(R::name(), outcome, millis);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use soy_model::{Job, Module, ObjectMeta, OwnerReference};

    use super::*;
    use crate::{
        client::{Api, MemoryStore, WatchAction},
        metrics::MetricsBackend,
    };

    /// Reconciler that records calls and follows a scripted plan.
    struct Scripted {
        client: Client,
        calls: Arc<Mutex<Vec<ObjectKey>>>,
        running: Arc<AtomicUsize>,
        overlap: Arc<AtomicUsize>,
        fail_first: Arc<AtomicUsize>,
        requeue_first: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Reconciler for Scripted {
        type Object = Module;

        fn name() -> &'static str {
            "scripted"
        }

        fn owns() -> &'static [&'static str] {
            &["Job"]
        }

        async fn keys(&self) -> CoreResult<Vec<ObjectKey>> {
            Ok(self.client.modules.list(None).await?.iter().map(|m| m.key()).collect())
        }

        async fn reconcile(&self, key: &ObjectKey) -> CoreResult<Action> {
            if self.running.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlap.fetch_add(1, Ordering::SeqCst);
            }
            self.calls.lock().unwrap().push(key.clone());
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CoreError::InvalidResource {
                    key: key.to_string(),
                    reason: "scripted failure".into(),
                });
            }
            if self
                .requeue_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(Action::Requeue(Duration::from_millis(50)));
            }
            Ok(Action::Done)
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ReconcileOutcome>>);

    impl MetricsBackend for Recorder {
        fn record_reconcile(&self, _: &str, outcome: ReconcileOutcome, _: u64) {
            self.0.lock().unwrap().push(outcome);
        }
        fn record_child_created(&self, _: &str, _: &str) {}
        fn record_child_pruned(&self, _: &str, _: &str) {}
    }

    struct Setup {
        store: MemoryStore,
        calls: Arc<Mutex<Vec<ObjectKey>>>,
        overlap: Arc<AtomicUsize>,
        metrics: Arc<Recorder>,
        cancel: CancellationToken,
    }

    fn start(workers: usize, fail_first: usize, requeue_first: usize, store: MemoryStore) -> Setup {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let overlap = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(Recorder::default());
        let scripted = Scripted {
            client: store.client(),
            calls: calls.clone(),
            running: Arc::new(AtomicUsize::new(0)),
            overlap: overlap.clone(),
            fail_first: Arc::new(AtomicUsize::new(fail_first)),
            requeue_first: Arc::new(AtomicUsize::new(requeue_first)),
        };
        let settings = Arc::new(soy_settings::SettingsStore::from_settings(Default::default()));
        let ctx = Context::new(store.client(), settings).with_metrics(metrics.clone());
        let config = ManagerConfig {
            workers,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(40),
        };
        let manager = Manager::new(scripted, &ctx, config);
        let cancel = CancellationToken::new();
        tokio::spawn(manager.run(cancel.clone()));
        Setup {
            store,
            calls,
            overlap,
            metrics,
            cancel,
        }
    }

    fn module(name: &str) -> Module {
        Module {
            metadata: ObjectMeta::named("default", name),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    fn count(calls: &Mutex<Vec<ObjectKey>>, name: &str) -> usize {
        calls.lock().unwrap().iter().filter(|k| k.name == name).count()
    }

    #[test]
    fn owned_events_route_to_controller_owner() {
        let event = WatchEvent {
            kind: "Job",
            action: WatchAction::Modified,
            key: ObjectKey::new("infra", "net-abcde"),
            owner: Some(OwnerReference {
                kind: "Module".into(),
                name: "net".into(),
                controller: true,
                ..Default::default()
            }),
        };
        assert_eq!(Manager::<Scripted>::route(&event), Some(ObjectKey::new("infra", "net")));

        let foreign = WatchEvent {
            owner: Some(OwnerReference {
                kind: "Stack".into(),
                name: "net".into(),
                controller: true,
                ..Default::default()
            }),
            ..event.clone()
        };
        assert_eq!(Manager::<Scripted>::route(&foreign), None);

        let unrelated = WatchEvent {
            kind: "Execution",
            ..event
        };
        assert_eq!(Manager::<Scripted>::route(&unrelated), None);
    }

    #[tokio::test]
    async fn initial_sync_reconciles_existing_objects() {
        let store = MemoryStore::new();
        store.modules().create(module("a")).await.unwrap();
        store.modules().create(module("b")).await.unwrap();

        let s = start(4, 0, 0, store);
        settle().await;
        s.cancel.cancel();

        assert_eq!(count(&s.calls, "a"), 1);
        assert_eq!(count(&s.calls, "b"), 1);
    }

    #[tokio::test]
    async fn events_for_one_key_never_overlap() {
        let store = MemoryStore::new();
        store.modules().create(module("a")).await.unwrap();
        let s = start(4, 0, 0, store);
        tokio::time::sleep(Duration::from_millis(5)).await;

        for _ in 0..5 {
            let mut m = s.store.modules().get(&ObjectKey::new("default", "a")).await.unwrap();
            m.metadata.labels.insert("touch".into(), "x".into());
            m.metadata.resource_version.clear();
            s.store.modules().update(m).await.unwrap();
        }
        settle().await;
        s.cancel.cancel();

        assert_eq!(s.overlap.load(Ordering::SeqCst), 0);
        // Initial pass plus one collapsed re-run for the burst.
        let n = count(&s.calls, "a");
        assert!((2..=3).contains(&n), "unexpected reconcile count {n}");
    }

    #[tokio::test]
    async fn owned_child_change_reconciles_owner() {
        let store = MemoryStore::new();
        let owner = store.modules().create(module("a")).await.unwrap();
        let s = start(1, 0, 0, store);
        settle().await;

        let mut job = Job {
            metadata: ObjectMeta::named("default", "a-job"),
            ..Default::default()
        };
        job.metadata.owner_references.push(owner.controller_ref());
        s.store.jobs().create(job).await.unwrap();
        settle().await;
        s.cancel.cancel();

        assert_eq!(count(&s.calls, "a"), 2);
    }

    #[tokio::test]
    async fn requeue_runs_again() {
        let store = MemoryStore::new();
        store.modules().create(module("a")).await.unwrap();
        let s = start(1, 0, 1, store);
        settle().await;
        s.cancel.cancel();

        assert_eq!(count(&s.calls, "a"), 2);
        let outcomes = s.metrics.0.lock().unwrap().clone();
        assert_eq!(outcomes, [ReconcileOutcome::Requeue, ReconcileOutcome::Done]);
    }

    #[tokio::test]
    async fn errors_are_retried_with_backoff() {
        let store = MemoryStore::new();
        store.modules().create(module("a")).await.unwrap();
        let s = start(1, 2, 0, store);
        settle().await;
        s.cancel.cancel();

        assert_eq!(count(&s.calls, "a"), 3);
        let outcomes = s.metrics.0.lock().unwrap().clone();
        assert_eq!(
            outcomes,
            [ReconcileOutcome::Error, ReconcileOutcome::Error, ReconcileOutcome::Done]
        );
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Never finishes a pass on its own.
    struct Stuck {
        client: Client,
        started: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Reconciler for Stuck {
        type Object = Module;

        fn name() -> &'static str {
            "stuck"
        }

        fn owns() -> &'static [&'static str] {
            &[]
        }

        async fn keys(&self) -> CoreResult<Vec<ObjectKey>> {
            Ok(self.client.modules.list(None).await?.iter().map(|m| m.key()).collect())
        }

        async fn reconcile(&self, _: &ObjectKey) -> CoreResult<Action> {
            let _flag = DropFlag(self.dropped.clone());
            self.started.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Action::Done)
        }
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_passes() {
        let store = MemoryStore::new();
        store.modules().create(module("a")).await.unwrap();
        let started = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let stuck = Stuck {
            client: store.client(),
            started: started.clone(),
            dropped: dropped.clone(),
        };
        let settings = Arc::new(soy_settings::SettingsStore::from_settings(Default::default()));
        let ctx = Context::new(store.client(), settings);
        let manager = Manager::new(stuck, &ctx, ManagerConfig::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(manager.run(cancel.clone()));

        tokio::time::timeout(Duration::from_secs(1), async {
            while !started.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let store = MemoryStore::new();
        let scripted = Scripted {
            client: store.client(),
            calls: Arc::default(),
            running: Arc::default(),
            overlap: Arc::default(),
            fail_first: Arc::default(),
            requeue_first: Arc::default(),
        };
        let settings = Arc::new(soy_settings::SettingsStore::from_settings(Default::default()));
        let ctx = Context::new(store.client(), settings);
        let manager = Manager::new(scripted, &ctx, ManagerConfig::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(manager.run(cancel.clone()));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
