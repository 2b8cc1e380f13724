//! Test harness: an in-memory store, a manual clock and seeding helpers.
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use soy_model::{
    ANNOTATION_MODULE_GENERATION, Execution, Job, JobStatus, Module, ModuleSpec, ObjectKey,
    ObjectMeta, ObjectRef, Phase, Resource, Stack, StackSpec, TriggeredBy,
};
use soy_settings::{Settings, SettingsStore};

use crate::{
    client::{Api, MemoryStore},
    context::{Context, testing::ManualClock},
    controller::{
        ExecutionController, ModuleController, StackController,
        parent::{Launch, new_execution},
    },
};

pub(crate) struct Harness {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub ctx: Context,
}

impl Harness {
    /// Harness with default settings loaded.
    pub fn new() -> Self {
        Self::with_settings(SettingsStore::from_settings(Settings::default()))
    }

    /// Harness whose settings were never loaded.
    pub fn unloaded() -> Self {
        Self::with_settings(SettingsStore::new(vec!["/nonexistent/soyplane.yaml".into()]))
    }

    fn with_settings(settings: SettingsStore) -> Self {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap());
        let ctx = Context::new(store.client(), Arc::new(settings)).with_clock(clock.clone());
        Self { store, clock, ctx }
    }

    pub fn execution_controller(&self) -> ExecutionController {
        ExecutionController::new(self.ctx.clone())
    }

    pub fn module_controller(&self) -> ModuleController {
        ModuleController::new(self.ctx.clone())
    }

    pub fn stack_controller(&self) -> StackController {
        StackController::new(self.ctx.clone())
    }

    pub fn module_spec(&self, name: &str, source: &str) -> Module {
        Module {
            metadata: ObjectMeta::named("default", name),
            spec: ModuleSpec {
                source: source.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub async fn module(&self, name: &str, source: &str) -> Module {
        self.store
            .modules()
            .create(self.module_spec(name, source))
            .await
            .unwrap()
    }

    pub async fn module_by_key(&self, key: &ObjectKey) -> Module {
        self.store.modules().get(key).await.unwrap()
    }

    /// Change the Module source, bumping its generation.
    pub async fn edit_source(&self, key: &ObjectKey, source: &str) -> Module {
        let mut module = self.module_by_key(key).await;
        module.spec.source = source.into();
        self.store.modules().update(module).await.unwrap()
    }

    pub async fn stack(&self, name: &str, module: &str, edit: impl FnOnce(&mut Stack)) -> Stack {
        let mut stack = Stack {
            metadata: ObjectMeta::named("default", name),
            spec: StackSpec {
                module_ref: ObjectRef::new("", module),
                ..Default::default()
            },
            ..Default::default()
        };
        edit(&mut stack);
        self.store.stacks().create(stack).await.unwrap()
    }

    pub async fn stack_by_key(&self, key: &ObjectKey) -> Stack {
        self.store.stacks().get(key).await.unwrap()
    }

    /// Execution created for `module` the way its controller would.
    pub async fn execution_for(&self, module: &Module) -> Execution {
        let exec = new_execution(
            module,
            Launch {
                template: &module.spec.execution_template,
                module_ref: ObjectRef::new("", module.metadata.name.as_str()),
                stamp: ANNOTATION_MODULE_GENERATION,
                trigger: TriggeredBy::Create,
                revision: Some(module.spec.revision()),
            },
        );
        self.store.executions().create(exec).await.unwrap()
    }

    pub async fn execution(&self, key: &ObjectKey) -> Execution {
        self.store.executions().get(key).await.unwrap()
    }

    pub async fn executions_of(&self, owner: &ObjectMeta) -> Vec<Execution> {
        self.store.executions().list_owned(owner).await.unwrap()
    }

    pub async fn set_execution_phase(&self, key: &ObjectKey, phase: Phase) {
        let mut exec = self.execution(key).await;
        exec.status.phase = phase;
        self.store.executions().update_status(exec).await.unwrap();
    }

    pub async fn finish_execution(&self, key: &ObjectKey, phase: Phase, at: DateTime<Utc>) {
        let mut exec = self.execution(key).await;
        exec.status.phase = phase;
        exec.status.execution.finished_at = Some(at);
        self.store.executions().update_status(exec).await.unwrap();
    }

    /// Job owned by `exec` with a fixed creation time in seconds.
    pub async fn job_for(&self, exec: &Execution, name: &str, created_secs: i64) -> Job {
        let mut meta = ObjectMeta::named(exec.metadata.namespace.as_str(), name);
        meta.creation_timestamp = Utc.timestamp_opt(created_secs, 0).single();
        meta.owner_references.push(exec.controller_ref());
        self.store
            .jobs()
            .create(Job {
                metadata: meta,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn jobs_of(&self, exec: &Execution) -> Vec<Job> {
        self.store.jobs().list_owned(&exec.metadata).await.unwrap()
    }

    pub async fn set_job_status(&self, job: &Job, status: JobStatus) {
        let mut job = self.store.jobs().get(&job.key()).await.unwrap();
        job.status = status;
        self.store.jobs().update_status(job).await.unwrap();
    }
}
