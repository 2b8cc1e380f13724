use async_trait::async_trait;
use soy_model::{ANNOTATION_MODULE_GENERATION, Execution, Module, ObjectKey, ObjectRef, Resource};
use tracing::{debug, info, instrument};

use crate::{
    context::Context,
    controller::{
        Action, Reconciler, all_keys, fetch,
        parent::{Launch, current_execution, mirror, new_execution},
        write_status,
    },
    error::CoreResult,
    trigger::{Observed, decide},
};

const NAME: &str = "module";

/// Keeps one current Execution per Module generation and mirrors its phase.
#[derive(Debug, Clone)]
pub struct ModuleController {
    ctx: Context,
}

impl ModuleController {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Reconciler for ModuleController {
    type Object = Module;

    fn name() -> &'static str {
        NAME
    }

    fn owns() -> &'static [&'static str] {
        &[Execution::KIND]
    }

    async fn keys(&self) -> CoreResult<Vec<ObjectKey>> {
        all_keys(self.ctx.client().modules.as_ref()).await
    }

    #[instrument(level = "debug", skip(self, key), fields(controller = NAME, key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> CoreResult<Action> {
        let client = self.ctx.client();
        let Some(module) = fetch(client.modules.as_ref(), key).await? else {
            debug!("module not found, nothing to do");
            return Ok(Action::Done);
        };
        let generation = module.metadata.generation;

        let current = current_execution(client.executions.as_ref(), &module.metadata).await?;
        let observed = current
            .as_ref()
            .map(|e| Observed::of(e, ANNOTATION_MODULE_GENERATION));

        if let Some(trigger) = decide(observed.as_ref(), generation) {
            let exec = new_execution(
                &module,
                Launch {
                    template: &module.spec.execution_template,
                    module_ref: ObjectRef::new(module.metadata.namespace.as_str(), module.metadata.name.as_str()),
                    stamp: ANNOTATION_MODULE_GENERATION,
                    trigger,
                    revision: Some(module.spec.revision()),
                },
            );
            let exec = client.executions.create(exec).await?;
            self.ctx.metrics().record_child_created(NAME, Execution::KIND);
            info!(execution = %exec.key(), %trigger, generation, "created execution");
            return Ok(Action::Done);
        }

        let Some(current) = current else {
            return Ok(Action::Done);
        };
        let mut next = module.clone();
        let status = &mut next.status;
        let changed = mirror(
            &mut status.last_execution_name,
            &mut status.phase,
            &mut status.observed_generation,
            &current,
            generation,
        );
        if changed && write_status(client.modules.as_ref(), next).await? {
            debug!(execution = %current.metadata.name, phase = %current.status.phase, "module status updated");
        }
        Ok(Action::Done)
    }
}

#[cfg(test)]
mod tests {
    use soy_model::{JobStatus, Phase, TemplateMetadata};

    use super::*;
    use crate::{
        client::{Api, Op, StoreError},
        controller::fixtures::Harness,
        trigger::stamped_generation,
    };

    #[tokio::test]
    async fn missing_module_is_a_no_op() {
        let h = Harness::new();
        let action = h
            .module_controller()
            .reconcile(&ObjectKey::new("default", "gone"))
            .await
            .unwrap();
        assert_eq!(action, Action::Done);
    }

    #[tokio::test]
    async fn first_pass_creates_stamped_execution() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;

        h.module_controller().reconcile(&module.key()).await.unwrap();

        let execs = h.executions_of(&module.metadata).await;
        assert_eq!(execs.len(), 1);
        let exec = &execs[0];
        assert!(exec.metadata.name.starts_with("network-"));
        assert_eq!(stamped_generation(exec, ANNOTATION_MODULE_GENERATION), Some(1));
        assert_eq!(exec.metadata.annotation(soy_model::ANNOTATION_TRIGGERED_BY), Some("create"));
        assert_eq!(exec.spec.module_ref, ObjectRef::new("default", "network"));
        assert_eq!(exec.status.phase, Phase::Pending);
    }

    #[tokio::test]
    async fn template_metadata_is_applied() {
        let h = Harness::new();
        let mut module = h.module_spec("network", "git://x");
        module.spec.execution_template.metadata = TemplateMetadata {
            generate_name: Some("net-run-".into()),
            ..Default::default()
        };
        module
            .spec
            .execution_template
            .metadata
            .labels
            .insert("team".into(), "infra".into());
        let module = h.store.modules().create(module).await.unwrap();

        h.module_controller().reconcile(&module.key()).await.unwrap();

        let exec = &h.executions_of(&module.metadata).await[0];
        assert!(exec.metadata.name.starts_with("net-run-"));
        assert_eq!(exec.metadata.label("team"), Some("infra"));
    }

    #[tokio::test]
    async fn second_pass_mirrors_status_once() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;
        let ctrl = h.module_controller();

        ctrl.reconcile(&module.key()).await.unwrap();
        ctrl.reconcile(&module.key()).await.unwrap();
        ctrl.reconcile(&module.key()).await.unwrap();

        let exec = &h.executions_of(&module.metadata).await[0];
        let module = h.module_by_key(&module.key()).await;
        assert_eq!(module.status.last_execution_name, exec.metadata.name);
        assert_eq!(module.status.phase, Some(Phase::Pending));
        assert_eq!(module.status.observed_generation, 1);
        assert_eq!(h.store.modules().status_writes(), 1);
    }

    #[tokio::test]
    async fn unchanged_generation_never_retriggers() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;
        let ctrl = h.module_controller();
        ctrl.reconcile(&module.key()).await.unwrap();
        let exec = &h.executions_of(&module.metadata).await[0];
        h.set_execution_phase(&exec.key(), Phase::Succeeded).await;

        ctrl.reconcile(&module.key()).await.unwrap();
        ctrl.reconcile(&module.key()).await.unwrap();

        assert_eq!(h.executions_of(&module.metadata).await.len(), 1);
    }

    #[tokio::test]
    async fn spec_change_waits_for_running_execution() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;
        let ctrl = h.module_controller();
        ctrl.reconcile(&module.key()).await.unwrap();
        let exec = &h.executions_of(&module.metadata).await[0];
        h.set_execution_phase(&exec.key(), Phase::Running).await;

        let module = h.edit_source(&module.key(), "git://y").await;
        assert_eq!(module.metadata.generation, 2);
        ctrl.reconcile(&module.key()).await.unwrap();

        assert_eq!(h.executions_of(&module.metadata).await.len(), 1);
    }

    #[tokio::test]
    async fn spec_change_after_success_supersedes() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;
        let ctrl = h.module_controller();
        ctrl.reconcile(&module.key()).await.unwrap();
        let first = h.executions_of(&module.metadata).await.remove(0);

        // Drive the first run to success through its Job.
        let exec_ctrl = h.execution_controller();
        exec_ctrl.reconcile(&first.key()).await.unwrap();
        let job = h.jobs_of(&first).await.remove(0);
        h.set_job_status(
            &job,
            JobStatus {
                succeeded: 1,
                ..Default::default()
            },
        )
        .await;
        exec_ctrl.reconcile(&first.key()).await.unwrap();
        assert_eq!(h.execution(&first.key()).await.status.phase, Phase::Succeeded);

        let module = h.edit_source(&module.key(), "git://y").await;
        ctrl.reconcile(&module.key()).await.unwrap();

        let execs = h.executions_of(&module.metadata).await;
        assert_eq!(execs.len(), 2);
        let second = execs
            .iter()
            .find(|e| e.metadata.name != first.metadata.name)
            .unwrap();
        assert_eq!(stamped_generation(second, ANNOTATION_MODULE_GENERATION), Some(2));
        assert_eq!(
            second.metadata.annotation(soy_model::ANNOTATION_TRIGGERED_BY),
            Some("spec-change")
        );

        ctrl.reconcile(&module.key()).await.unwrap();
        let module = h.module_by_key(&module.key()).await;
        assert_eq!(module.status.last_execution_name, second.metadata.name);
        assert_eq!(module.status.observed_generation, 2);
    }

    #[tokio::test]
    async fn status_conflict_is_benign() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;
        let ctrl = h.module_controller();
        ctrl.reconcile(&module.key()).await.unwrap();
        h.store.modules().fail_next(
            Op::UpdateStatus,
            StoreError::Conflict {
                kind: "Module",
                key: module.key(),
                reason: "stale".into(),
            },
        );

        let action = ctrl.reconcile(&module.key()).await.unwrap();
        assert_eq!(action, Action::Done);
        assert_eq!(h.store.modules().status_writes(), 0);
    }

    #[tokio::test]
    async fn create_errors_are_surfaced() {
        let h = Harness::new();
        let module = h.module("network", "git://x").await;
        h.store
            .executions()
            .fail_next(Op::Create, StoreError::Backend("quota".into()));

        assert!(h.module_controller().reconcile(&module.key()).await.is_err());
        assert!(h.executions_of(&module.metadata).await.is_empty());
    }
}
