use async_trait::async_trait;
use soy_model::{
    ANNOTATION_STACK_GENERATION, Action as RunAction, Execution, LABEL_STACK, ObjectKey, Resource,
    Stack, StackStatus, TriggeredBy, set_condition,
};
use tracing::{debug, info, instrument};

use crate::{
    context::Context,
    controller::{
        Action, Reconciler, all_keys, fetch,
        parent::{Launch, current_execution, mirror, new_execution},
        write_status,
    },
    error::CoreResult,
    status::ready_condition,
    trigger::{DriftCheck, Observed, decide, drift_check, last_run},
};

const NAME: &str = "stack";

/// Runs a Module on behalf of a Stack: on creation, on spec change and
/// again whenever the drift interval elapses.
#[derive(Debug, Clone)]
pub struct StackController {
    ctx: Context,
}

impl StackController {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn launch(&self, stack: &Stack, trigger: TriggeredBy) -> CoreResult<Execution> {
        let client = self.ctx.client();
        let module_key = stack.spec.module_ref.to_key(&stack.metadata.namespace);
        // The revision is informational; a missing Module is reported by the
        // Execution when it tries to build its Job.
        let module = fetch(client.modules.as_ref(), &module_key).await?;

        let mut exec = new_execution(
            stack,
            Launch {
                template: &stack.spec.execution_template,
                module_ref: stack.spec.module_ref.clone(),
                stamp: ANNOTATION_STACK_GENERATION,
                trigger,
                revision: module.as_ref().map(|m| m.spec.revision()),
            },
        );
        if stack.spec.auto_apply {
            exec.spec.action = RunAction::Apply;
        }
        exec.metadata
            .labels
            .insert(LABEL_STACK.to_string(), stack.metadata.name.clone());

        let exec = client.executions.create(exec).await?;
        self.ctx.metrics().record_child_created(NAME, Execution::KIND);
        Ok(exec)
    }

    /// Mirror `exec` into `status`. Returns `true` if anything changed.
    fn mirror_status(&self, status: &mut StackStatus, exec: &Execution, generation: i64) -> bool {
        let mut changed = mirror(
            &mut status.last_execution_name,
            &mut status.phase,
            &mut status.observed_generation,
            exec,
            generation,
        );

        let summary = Some(exec.status.execution.clone());
        let slot = match exec.spec.action {
            RunAction::Plan => &mut status.last_plan,
            RunAction::Apply => &mut status.last_apply,
        };
        if *slot != summary {
            *slot = summary;
            changed = true;
        }

        let ready = ready_condition(
            exec.status.phase,
            exec.status.execution.summary.as_str(),
            generation,
            self.ctx.now(),
        );
        set_condition(&mut status.conditions, ready) || changed
    }
}

#[async_trait]
impl Reconciler for StackController {
    type Object = Stack;

    fn name() -> &'static str {
        NAME
    }

    fn owns() -> &'static [&'static str] {
        &[Execution::KIND]
    }

    async fn keys(&self) -> CoreResult<Vec<ObjectKey>> {
        all_keys(self.ctx.client().stacks.as_ref()).await
    }

    #[instrument(level = "debug", skip(self, key), fields(controller = NAME, key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> CoreResult<Action> {
        let client = self.ctx.client();
        let Some(stack) = fetch(client.stacks.as_ref(), key).await? else {
            debug!("stack not found, nothing to do");
            return Ok(Action::Done);
        };
        let generation = stack.metadata.generation;

        let current = current_execution(client.executions.as_ref(), &stack.metadata).await?;
        let observed = current
            .as_ref()
            .map(|e| Observed::of(e, ANNOTATION_STACK_GENERATION));

        let mut trigger = decide(observed.as_ref(), generation);
        let mut after = None;
        let drift = stack.spec.drift_interval().zip(current.as_ref());
        if let (None, Some((interval, exec))) = (trigger, drift) {
            let check = last_run(exec)
                .map(|at| drift_check(interval, exec.status.phase, at, self.ctx.now()));
            match check {
                Some(DriftCheck::Due) => trigger = Some(TriggeredBy::Drift),
                Some(DriftCheck::Wait(remaining)) => after = Some(remaining),
                Some(DriftCheck::Idle) | None => {}
            }
        }

        if let Some(trigger) = trigger {
            let exec = self.launch(&stack, trigger).await?;
            info!(execution = %exec.key(), %trigger, generation, "created execution");
            return Ok(Action::Done);
        }

        let Some(current) = current else {
            return Ok(Action::Done);
        };
        let mut next = stack.clone();
        if self.mirror_status(&mut next.status, &current, generation)
            && !write_status(client.stacks.as_ref(), next).await?
        {
            return Ok(Action::Done);
        }

        Ok(after.map_or(Action::Done, Action::Requeue))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use soy_model::{
        ANNOTATION_REVISION, ANNOTATION_TRIGGERED_BY, ConditionStatus, DriftDetection, Phase,
    };

    use super::*;
    use crate::{Clock, client::Api, controller::fixtures::Harness, trigger::stamped_generation};

    #[tokio::test]
    async fn first_pass_creates_labelled_execution() {
        let h = Harness::new();
        h.module("network", "git://x").await;
        let stack = h.stack("prod-net", "network", |_| {}).await;

        let action = h.stack_controller().reconcile(&stack.key()).await.unwrap();
        assert_eq!(action, Action::Done);

        let execs = h.executions_of(&stack.metadata).await;
        assert_eq!(execs.len(), 1);
        let exec = &execs[0];
        assert!(exec.metadata.name.starts_with("prod-net-"));
        assert_eq!(exec.metadata.label(LABEL_STACK), Some("prod-net"));
        assert_eq!(exec.spec.module_ref.name, "network");
        assert_eq!(exec.spec.action, RunAction::Plan);
        assert_eq!(stamped_generation(exec, ANNOTATION_STACK_GENERATION), Some(1));
        assert_eq!(exec.metadata.annotation(ANNOTATION_REVISION), Some("HEAD"));
    }

    #[tokio::test]
    async fn auto_apply_overrides_template_action() {
        let h = Harness::new();
        let stack = h.stack("prod-net", "network", |s| s.spec.auto_apply = true).await;

        h.stack_controller().reconcile(&stack.key()).await.unwrap();

        let exec = &h.executions_of(&stack.metadata).await[0];
        assert_eq!(exec.spec.action, RunAction::Apply);
        assert_eq!(exec.metadata.annotation(ANNOTATION_REVISION), None);
    }

    #[tokio::test]
    async fn status_tracks_last_plan_and_ready() {
        let h = Harness::new();
        let stack = h.stack("prod-net", "network", |_| {}).await;
        let ctrl = h.stack_controller();
        ctrl.reconcile(&stack.key()).await.unwrap();
        let exec = h.executions_of(&stack.metadata).await.remove(0);
        h.set_execution_phase(&exec.key(), Phase::Succeeded).await;

        ctrl.reconcile(&stack.key()).await.unwrap();
        ctrl.reconcile(&stack.key()).await.unwrap();

        let stack = h.stack_by_key(&stack.key()).await;
        assert_eq!(stack.status.phase, Some(Phase::Succeeded));
        assert_eq!(stack.status.last_execution_name, exec.metadata.name);
        assert!(stack.status.last_plan.is_some());
        assert!(stack.status.last_apply.is_none());
        assert_eq!(stack.status.conditions[0].status, ConditionStatus::True);
        assert_eq!(h.store.stacks().status_writes(), 1);
    }

    #[tokio::test]
    async fn spec_change_retriggers_after_terminal() {
        let h = Harness::new();
        let stack = h.stack("prod-net", "network", |_| {}).await;
        let ctrl = h.stack_controller();
        ctrl.reconcile(&stack.key()).await.unwrap();
        let exec = h.executions_of(&stack.metadata).await.remove(0);
        h.set_execution_phase(&exec.key(), Phase::Failed).await;

        let mut edited = h.stack_by_key(&stack.key()).await;
        edited.spec.auto_apply = true;
        let edited = h.store.stacks().update(edited).await.unwrap();
        assert_eq!(edited.metadata.generation, 2);

        ctrl.reconcile(&stack.key()).await.unwrap();

        let execs = h.executions_of(&stack.metadata).await;
        assert_eq!(execs.len(), 2);
        let newest = execs.iter().find(|e| e.metadata.name != exec.metadata.name).unwrap();
        assert_eq!(newest.metadata.annotation(ANNOTATION_TRIGGERED_BY), Some("spec-change"));
        assert_eq!(newest.spec.action, RunAction::Apply);
    }

    #[tokio::test]
    async fn drift_requeues_then_retriggers() {
        let h = Harness::new();
        let stack = h
            .stack("prod-net", "network", |s| {
                s.spec.drift_detection = Some(DriftDetection {
                    enabled: true,
                    interval: Some(Duration::from_secs(600)),
                });
            })
            .await;
        let ctrl = h.stack_controller();
        ctrl.reconcile(&stack.key()).await.unwrap();
        let exec = h.executions_of(&stack.metadata).await.remove(0);
        h.finish_execution(&exec.key(), Phase::Succeeded, h.clock.now()).await;

        h.clock.advance(chrono::Duration::minutes(4));
        let action = ctrl.reconcile(&stack.key()).await.unwrap();
        assert_eq!(action, Action::Requeue(Duration::from_secs(360)));
        assert_eq!(h.executions_of(&stack.metadata).await.len(), 1);

        h.clock.advance(chrono::Duration::minutes(6));
        ctrl.reconcile(&stack.key()).await.unwrap();

        let execs = h.executions_of(&stack.metadata).await;
        assert_eq!(execs.len(), 2);
        let drift = execs.iter().find(|e| e.metadata.name != exec.metadata.name).unwrap();
        assert_eq!(drift.metadata.annotation(ANNOTATION_TRIGGERED_BY), Some("drift"));
        assert_eq!(stamped_generation(drift, ANNOTATION_STACK_GENERATION), Some(1));
    }

    #[tokio::test]
    async fn drift_waits_for_running_execution() {
        let h = Harness::new();
        let stack = h
            .stack("prod-net", "network", |s| {
                s.spec.drift_detection = Some(DriftDetection {
                    enabled: true,
                    interval: Some(Duration::from_secs(1)),
                });
            })
            .await;
        let ctrl = h.stack_controller();
        ctrl.reconcile(&stack.key()).await.unwrap();
        let exec = h.executions_of(&stack.metadata).await.remove(0);
        h.set_execution_phase(&exec.key(), Phase::Running).await;
        h.clock.advance(chrono::Duration::hours(1));

        let action = ctrl.reconcile(&stack.key()).await.unwrap();
        assert_eq!(action, Action::Done);
        assert_eq!(h.executions_of(&stack.metadata).await.len(), 1);
    }

    #[tokio::test]
    async fn disabled_drift_never_retriggers() {
        let h = Harness::new();
        let stack = h
            .stack("prod-net", "network", |s| {
                s.spec.drift_detection = Some(DriftDetection {
                    enabled: false,
                    interval: Some(Duration::from_secs(1)),
                });
            })
            .await;
        let ctrl = h.stack_controller();
        ctrl.reconcile(&stack.key()).await.unwrap();
        let exec = h.executions_of(&stack.metadata).await.remove(0);
        h.finish_execution(&exec.key(), Phase::Succeeded, h.clock.now()).await;
        h.clock.advance(chrono::Duration::hours(1));

        assert_eq!(ctrl.reconcile(&stack.key()).await.unwrap(), Action::Done);
        assert_eq!(h.executions_of(&stack.metadata).await.len(), 1);
    }
}
