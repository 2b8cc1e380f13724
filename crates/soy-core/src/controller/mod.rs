//! The three reconcilers and the pieces they share.
mod execution;
pub use execution::ExecutionController;

mod job;
pub use job::{build_job, build_script, resolve_engine, resolve_image};

mod module;
pub use module::ModuleController;

mod parent;

mod stack;
pub use stack::StackController;

#[cfg(test)]
pub(crate) mod fixtures;

use std::time::Duration;

use async_trait::async_trait;
use soy_model::{ObjectKey, Resource};
use tracing::debug;

use crate::{
    client::{Api, StoreError},
    error::CoreResult,
};

/// Delay between passes while an Execution is pending or running.
pub const IN_FLIGHT_REQUEUE: Duration = Duration::from_secs(5);

/// What the manager should do after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Converged; wait for the next change notification.
    Done,
    /// Run again after the given delay (`ZERO` means as soon as possible).
    Requeue(Duration),
}

/// One level-triggered control loop.
///
/// `reconcile` must be idempotent: it is re-run on every change of the
/// object or its children and after every requeue. Implementations follow
/// the same contract:
/// 1. A missing object is a clean `Ok(Action::Done)`.
/// 2. Store errors other than not-found are returned; the manager retries
///    them with backoff.
/// 3. Status is written at most once per pass, and only when it changed.
///    A conflicting write is not an error.
///
/// # Examples
/// ```rust
/// use async_trait::async_trait;
/// use soy_core::{Action, CoreResult, Reconciler};
/// use soy_model::{Module, ObjectKey};
///
/// struct Noop;
///
/// #[async_trait]
/// impl Reconciler for Noop {
///     type Object = Module;
///
///     fn name() -> &'static str {
///         "noop"
///     }
///
///     fn owns() -> &'static [&'static str] {
///         &[]
///     }
///
///     async fn keys(&self) -> CoreResult<Vec<ObjectKey>> {
///         Ok(Vec::new())
///     }
///
///     async fn reconcile(&self, _key: &ObjectKey) -> CoreResult<Action> {
///         Ok(Action::Done)
///     }
/// }
/// ```
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    type Object: Resource;

    /// Controller name, used in logs and metric labels.
    fn name() -> &'static str;

    /// Kinds whose changes are routed to their controlling owner of this kind.
    fn owns() -> &'static [&'static str];

    /// Keys of every object this controller manages.
    async fn keys(&self) -> CoreResult<Vec<ObjectKey>>;

    async fn reconcile(&self, key: &ObjectKey) -> CoreResult<Action>;
}

/// `Ok(None)` when the object does not exist.
pub(crate) async fn fetch<K: Resource>(
    api: &dyn Api<K>,
    key: &ObjectKey,
) -> Result<Option<K>, StoreError> {
    match api.get(key).await {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write status, treating a version conflict as benign.
///
/// Returns `false` when the write lost a race; the newer version will
/// trigger another pass on its own.
pub(crate) async fn write_status<K: Resource>(api: &dyn Api<K>, obj: K) -> CoreResult<bool> {
    let key = obj.key();
    match api.update_status(obj).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_conflict() => {
            debug!(kind = K::KIND, %key, error = %e, "status write conflict, skipping");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Keys of every object of one kind.
pub(crate) async fn all_keys<K: Resource>(api: &dyn Api<K>) -> CoreResult<Vec<ObjectKey>> {
    Ok(api.list(None).await?.iter().map(|o| o.key()).collect())
}
