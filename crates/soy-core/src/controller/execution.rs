use std::time::Duration;

use async_trait::async_trait;
use soy_model::{
    ANNOTATION_REVISION, ANNOTATION_TRIGGERED_BY, Execution, ExecutionStatus, Job, ObjectKey,
    Phase, Resource, set_condition,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    context::Context,
    controller::{Action, IN_FLIGHT_REQUEUE, Reconciler, all_keys, build_job, fetch, write_status},
    error::{CoreError, CoreResult},
    ownership::split_newest,
    status::{derive_phase, ready_condition, summary_for},
};

const NAME: &str = "execution";

/// Drives one Job per Execution and reflects its progress in status.
#[derive(Debug, Clone)]
pub struct ExecutionController {
    ctx: Context,
}

impl ExecutionController {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Build and create the Job for `exec`.
    ///
    /// Settings are read before anything is written, so an unloaded
    /// settings store fails the pass without side effects.
    async fn launch(&self, exec: &Execution) -> CoreResult<Job> {
        let defaults = self.ctx.settings().execution_defaults()?;
        if exec.spec.module_ref.name.is_empty() {
            return Err(CoreError::InvalidResource {
                key: exec.key().to_string(),
                reason: "spec.moduleRef.name is empty".into(),
            });
        }
        let module_key = exec.spec.module_ref.to_key(&exec.metadata.namespace);
        let module = self.ctx.client().modules.get(&module_key).await?;

        let job = build_job(exec, &module, &defaults);
        let job = self.ctx.client().jobs.create(job).await?;
        self.ctx.metrics().record_child_created(NAME, Job::KIND);
        Ok(job)
    }

    /// Delete superseded Jobs. Failures are logged, never returned.
    async fn prune(&self, stale: Vec<Job>) {
        for job in stale {
            let key = job.key();
            match self.ctx.client().jobs.delete(&key).await {
                Ok(()) => {
                    self.ctx.metrics().record_child_pruned(NAME, Job::KIND);
                    info!(job = %key, "pruned stale job");
                }
                Err(e) if e.is_not_found() => debug!(job = %key, "stale job already gone"),
                Err(e) => warn!(job = %key, error = %e, "failed to prune stale job"),
            }
        }
    }

    /// Status `exec` should have given its active Job.
    fn desired_status(&self, exec: &Execution, job: &Job, phase: Phase) -> ExecutionStatus {
        let mut next = exec.status.clone();
        let summary = summary_for(phase, exec.spec.action);
        let view = &mut next.execution;

        view.job_name = job.metadata.name.clone();
        if let Some(started) = job.status.start_time {
            view.started_at = Some(started);
        }
        if let Some(finished) = job.status.completion_time {
            view.finished_at = Some(finished);
        } else if phase.is_terminal() && view.finished_at.is_none() {
            // Failed Jobs never report a completion time.
            view.finished_at = Some(self.ctx.now());
        }
        if let Some(revision) = exec.metadata.annotation(ANNOTATION_REVISION) {
            view.revision = revision.to_string();
        }
        if let Some(trigger) = exec.metadata.annotation(ANNOTATION_TRIGGERED_BY) {
            view.triggered_by = trigger.to_string();
        }
        view.summary = summary.clone();
        next.phase = phase;

        set_condition(
            &mut next.conditions,
            ready_condition(phase, summary, exec.metadata.generation, self.ctx.now()),
        );
        next
    }
}

#[async_trait]
impl Reconciler for ExecutionController {
    type Object = Execution;

    fn name() -> &'static str {
        NAME
    }

    fn owns() -> &'static [&'static str] {
        &[Job::KIND]
    }

    async fn keys(&self) -> CoreResult<Vec<ObjectKey>> {
        all_keys(self.ctx.client().executions.as_ref()).await
    }

    #[instrument(level = "debug", skip(self, key), fields(controller = NAME, key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> CoreResult<Action> {
        let client = self.ctx.client();
        let Some(exec) = fetch(client.executions.as_ref(), key).await? else {
            debug!("execution not found, nothing to do");
            return Ok(Action::Done);
        };

        let jobs = client.jobs.list_owned(&exec.metadata).await?;
        let split = split_newest(jobs);
        // Terminal phases are final: prune leftovers, never relaunch or rewrite.
        if exec.status.phase.is_terminal() {
            if let Some((_, stale)) = split.filter(|(_, stale)| !stale.is_empty()) {
                self.prune(stale).await;
            }
            debug!(phase = %exec.status.phase, "execution is terminal");
            return Ok(Action::Done);
        }

        let Some((active, stale)) = split else {
            let job = self.launch(&exec).await?;
            info!(job = %job.key(), "created job");
            return Ok(Action::Requeue(Duration::ZERO));
        };
        if !stale.is_empty() {
            self.prune(stale).await;
        }

        let phase = derive_phase(&active.status);
        let status = self.desired_status(&exec, &active, phase);
        if status != exec.status {
            let previous = exec.status.phase;
            let mut next = exec;
            next.status = status;
            if !write_status(client.executions.as_ref(), next).await? {
                return Ok(Action::Done);
            }
            if previous != phase {
                info!(from = %previous, to = %phase, "execution phase changed");
            }
        }

        if phase.is_terminal() {
            Ok(Action::Done)
        } else {
            Ok(Action::Requeue(IN_FLIGHT_REQUEUE))
        }
    }
}
