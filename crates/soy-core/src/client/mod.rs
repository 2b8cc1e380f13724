//! Platform surface the controllers read and write through.
//!
//! [`Api`] is the per-kind CRUD contract with optimistic concurrency on
//! `resourceVersion`; [`Client`] bundles one `Api` per kind the controllers
//! touch plus the watch stream. [`MemoryStore`] is the in-process backend.
mod error;
pub use error::StoreError;

mod memory;
pub use memory::{MemoryApi, MemoryStore, Op};

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use soy_model::{Execution, Job, Module, ObjectKey, ObjectMeta, OwnerReference, Resource, Stack};
use tokio::sync::broadcast;

use crate::ownership::filter_owned;

/// CRUD access to one kind.
///
/// Semantics every backend must keep:
/// 1. `create` assigns `uid`, `resourceVersion` and `generation = 1`, and
///    fills `creationTimestamp` only when the caller left it empty.
/// 2. `update` bumps `generation` only when the spec changed.
/// 3. `update` and `update_status` are optimistic: a stale
///    `resourceVersion` yields [`StoreError::Conflict`].
/// 4. Every successful mutation is announced on the watch stream.
///
/// # Examples
/// ```rust
/// use soy_core::client::{Api, MemoryStore};
/// use soy_model::{Module, ObjectMeta};
///
/// # async fn demo() -> Result<(), soy_core::client::StoreError> {
/// let store = MemoryStore::new();
/// let module = store
///     .modules()
///     .create(Module {
///         metadata: ObjectMeta::named("infra", "network"),
///         ..Default::default()
///     })
///     .await?;
/// assert_eq!(module.metadata.generation, 1);
///
/// let owned = store.executions().list_owned(&module.metadata).await?;
/// assert!(owned.is_empty());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Api<K: Resource>: Send + Sync {
    /// Fails with [`StoreError::NotFound`] when absent.
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError>;

    /// All objects of the kind, optionally restricted to one namespace.
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    /// Create `obj`. An empty name with `generateName` set gets a random suffix.
    async fn create(&self, obj: K) -> Result<K, StoreError>;

    /// Replace metadata and spec. Status is left untouched.
    async fn update(&self, obj: K) -> Result<K, StoreError>;

    /// Replace status only. Fails with [`StoreError::Conflict`] when
    /// `obj.resourceVersion` is stale.
    async fn update_status(&self, obj: K) -> Result<K, StoreError>;

    /// Fails with [`StoreError::NotFound`] when absent; callers pruning
    /// children treat that as success.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Objects in `owner`'s namespace whose controller reference is `owner`.
    async fn list_owned(&self, owner: &ObjectMeta) -> Result<Vec<K>, StoreError> {
        let candidates = self.list(Some(&owner.namespace)).await?;
        Ok(filter_owned(owner, candidates))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
}

/// Change notification emitted after every successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: &'static str,
    pub action: WatchAction,
    pub key: ObjectKey,
    /// Controller owner of the changed object, if any.
    pub owner: Option<OwnerReference>,
}

/// Typed handles to every kind the controllers use.
#[derive(Clone)]
pub struct Client {
    pub modules: Arc<dyn Api<Module>>,
    pub executions: Arc<dyn Api<Execution>>,
    pub stacks: Arc<dyn Api<Stack>>,
    pub jobs: Arc<dyn Api<Job>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Client {
    pub fn new(
        modules: Arc<dyn Api<Module>>,
        executions: Arc<dyn Api<Execution>>,
        stacks: Arc<dyn Api<Stack>>,
        jobs: Arc<dyn Api<Job>>,
        events: broadcast::Sender<WatchEvent>,
    ) -> Self {
        Self {
            modules,
            executions,
            stacks,
            jobs,
            events,
        }
    }

    /// Subscribe to change notifications from now on.
    pub fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("watchers", &self.events.receiver_count())
            .finish()
    }
}
