use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use soy_model::{Execution, Job, Manifest, Module, ObjectKey, Provider, Resource, Stack};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::client::{Api, Client, StoreError, WatchAction, WatchEvent};

const EVENT_CAPACITY: usize = 1024;
const NAME_SUFFIX_LEN: usize = 5;

/// Store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    List,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// In-memory [`Api`] for one kind.
///
/// Mirrors the platform semantics the controllers rely on: server-assigned
/// identity, `generation` bumps on spec change, optimistic concurrency on
/// `resourceVersion`, and a change event per mutation.
pub struct MemoryApi<K: Resource> {
    objects: RwLock<BTreeMap<ObjectKey, K>>,
    events: broadcast::Sender<WatchEvent>,
    revision: Arc<AtomicU64>,
    created_micros: Arc<AtomicI64>,
    faults: Mutex<Vec<(Op, StoreError)>>,
    status_writes: AtomicUsize,
}

impl<K: Resource> MemoryApi<K> {
    fn new(
        events: broadcast::Sender<WatchEvent>,
        revision: Arc<AtomicU64>,
        created_micros: Arc<AtomicI64>,
    ) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            events,
            revision,
            created_micros,
            faults: Mutex::new(Vec::new()),
            status_writes: AtomicUsize::new(0),
        }
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: Op, err: StoreError) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push((op, err));
        }
    }

    /// Number of successful `update_status` calls so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn injected(&self, op: Op) -> Result<(), StoreError> {
        let Ok(mut faults) = self.faults.lock() else {
            return Err(poisoned());
        };
        match faults.iter().position(|(o, _)| *o == op) {
            Some(idx) => Err(faults.remove(idx).1),
            None => Ok(()),
        }
    }

    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Creation time strictly after every earlier one handed out by the store.
    fn next_creation_time(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let prev = self
            .created_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        let micros = now.max(prev + 1);
        DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }

    fn emit(&self, action: WatchAction, obj: &K) {
        let event = WatchEvent {
            kind: K::KIND,
            action,
            key: obj.key(),
            owner: obj.meta().controller().cloned(),
        };
        trace!(kind = K::KIND, key = %event.key, ?action, "watch event");
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn conflict(key: &ObjectKey, expected: &str, actual: &str) -> StoreError {
        StoreError::Conflict {
            kind: K::KIND,
            key: key.clone(),
            reason: format!("resourceVersion {expected} is stale (current {actual})"),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..NAME_SUFFIX_LEN].to_string()
}

#[async_trait]
impl<K: Resource> Api<K> for MemoryApi<K> {
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.injected(Op::Get)?;
        let objects = self.objects.read().map_err(|_| poisoned())?;
        objects.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            kind: K::KIND,
            key: key.clone(),
        })
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        self.injected(Op::List)?;
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects
            .values()
            .filter(|o| namespace.is_none_or(|ns| o.meta().namespace == ns))
            .cloned()
            .collect())
    }

    async fn create(&self, mut obj: K) -> Result<K, StoreError> {
        self.injected(Op::Create)?;
        if obj.meta().namespace.is_empty() {
            return Err(StoreError::Invalid {
                kind: K::KIND,
                reason: "namespace is required".to_string(),
            });
        }

        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let meta = obj.meta_mut();
        if meta.name.is_empty() {
            let Some(prefix) = meta.generate_name.clone().filter(|p| !p.is_empty()) else {
                return Err(StoreError::Invalid {
                    kind: K::KIND,
                    reason: "name or generateName is required".to_string(),
                });
            };
            meta.name = loop {
                let candidate = format!("{prefix}{}", random_suffix());
                if !objects.contains_key(&ObjectKey::new(meta.namespace.as_str(), candidate.as_str())) {
                    break candidate;
                }
            };
        }

        let key = meta.key();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: K::KIND, key });
        }

        meta.uid = Uuid::new_v4().to_string();
        meta.generation = 1;
        meta.resource_version = self.next_revision();
        // Kept when preset so callers can seed history with known timestamps.
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(self.next_creation_time());
        }
        *obj.status_mut() = K::Status::default();

        objects.insert(key, obj.clone());
        drop(objects);

        self.emit(WatchAction::Added, &obj);
        Ok(obj)
    }

    async fn update(&self, mut obj: K) -> Result<K, StoreError> {
        self.injected(Op::Update)?;
        let key = obj.key();
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let Some(current) = objects.get(&key) else {
            return Err(StoreError::NotFound { kind: K::KIND, key });
        };

        let sent = obj.meta().resource_version.clone();
        if !sent.is_empty() && sent != current.meta().resource_version {
            return Err(Self::conflict(&key, &sent, &current.meta().resource_version));
        }

        let spec_changed = obj.spec() != current.spec();
        let generation = current.meta().generation;
        let uid = current.meta().uid.clone();
        let created = current.meta().creation_timestamp;
        *obj.status_mut() = current.status().clone();

        let meta = obj.meta_mut();
        meta.uid = uid;
        meta.creation_timestamp = created;
        meta.generation = if spec_changed { generation + 1 } else { generation };
        meta.resource_version = self.next_revision();

        objects.insert(key, obj.clone());
        drop(objects);

        self.emit(WatchAction::Modified, &obj);
        Ok(obj)
    }

    async fn update_status(&self, obj: K) -> Result<K, StoreError> {
        self.injected(Op::UpdateStatus)?;
        let key = obj.key();
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let Some(current) = objects.get(&key) else {
            return Err(StoreError::NotFound { kind: K::KIND, key });
        };

        let sent = &obj.meta().resource_version;
        if !sent.is_empty() && *sent != current.meta().resource_version {
            return Err(Self::conflict(&key, sent, &current.meta().resource_version));
        }

        let mut next = current.clone();
        *next.status_mut() = obj.status().clone();
        next.meta_mut().resource_version = self.next_revision();

        objects.insert(key, next.clone());
        drop(objects);

        self.status_writes.fetch_add(1, Ordering::SeqCst);
        self.emit(WatchAction::Modified, &next);
        Ok(next)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.injected(Op::Delete)?;
        let removed = {
            let mut objects = self.objects.write().map_err(|_| poisoned())?;
            objects.remove(key)
        };
        match removed {
            Some(obj) => {
                self.emit(WatchAction::Deleted, &obj);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: K::KIND,
                key: key.clone(),
            }),
        }
    }
}

/// One [`MemoryApi`] per kind sharing a revision counter and an event stream.
pub struct MemoryStore {
    modules: Arc<MemoryApi<Module>>,
    executions: Arc<MemoryApi<Execution>>,
    stacks: Arc<MemoryApi<Stack>>,
    jobs: Arc<MemoryApi<Job>>,
    providers: Arc<MemoryApi<Provider>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let revision = Arc::new(AtomicU64::new(0));
        let created = Arc::new(AtomicI64::new(0));
        Self {
            modules: Arc::new(MemoryApi::new(events.clone(), revision.clone(), created.clone())),
            executions: Arc::new(MemoryApi::new(events.clone(), revision.clone(), created.clone())),
            stacks: Arc::new(MemoryApi::new(events.clone(), revision.clone(), created.clone())),
            jobs: Arc::new(MemoryApi::new(events.clone(), revision.clone(), created.clone())),
            providers: Arc::new(MemoryApi::new(events.clone(), revision, created)),
            events,
        }
    }

    pub fn client(&self) -> Client {
        Client::new(
            self.modules.clone(),
            self.executions.clone(),
            self.stacks.clone(),
            self.jobs.clone(),
            self.events.clone(),
        )
    }

    pub fn modules(&self) -> &Arc<MemoryApi<Module>> {
        &self.modules
    }

    pub fn executions(&self) -> &Arc<MemoryApi<Execution>> {
        &self.executions
    }

    pub fn stacks(&self) -> &Arc<MemoryApi<Stack>> {
        &self.stacks
    }

    pub fn jobs(&self) -> &Arc<MemoryApi<Job>> {
        &self.jobs
    }

    pub fn providers(&self) -> &Arc<MemoryApi<Provider>> {
        &self.providers
    }

    /// Create the object a manifest describes.
    pub async fn apply(&self, manifest: Manifest) -> Result<ObjectKey, StoreError> {
        let key = match manifest {
            Manifest::Module(m) => self.modules.create(m).await?.key(),
            Manifest::Execution(e) => self.executions.create(e).await?.key(),
            Manifest::Stack(s) => self.stacks.create(s).await?.key(),
            Manifest::Provider(p) => self.providers.create(p).await?.key(),
        };
        Ok(key)
    }
}
