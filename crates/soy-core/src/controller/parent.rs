//! Execution bookkeeping shared by the Module and Stack controllers.
use soy_model::{
    ANNOTATION_REVISION, ANNOTATION_TRIGGERED_BY, Execution, ExecutionTemplate, ObjectMeta,
    ObjectRef, Phase, Resource, TriggeredBy,
};

use crate::{client::Api, error::CoreResult, ownership::newest};

/// Newest Execution controlled by `parent`.
pub(super) async fn current_execution(
    api: &dyn Api<Execution>,
    parent: &ObjectMeta,
) -> CoreResult<Option<Execution>> {
    Ok(newest(api.list_owned(parent).await?))
}

/// Inputs for a new Execution on behalf of a parent.
pub(super) struct Launch<'a> {
    pub template: &'a ExecutionTemplate,
    pub module_ref: ObjectRef,
    /// Annotation that records the parent generation.
    pub stamp: &'static str,
    pub trigger: TriggeredBy,
    pub revision: Option<&'a str>,
}

/// Unsaved Execution controlled by `parent`.
///
/// The name is generated by the store from the template's `generateName`,
/// else `<parent>-`.
pub(super) fn new_execution<P: Resource>(parent: &P, launch: Launch<'_>) -> Execution {
    let meta = parent.meta();
    let template = launch.template;

    let mut annotations = template.metadata.annotations.clone();
    annotations.insert(launch.stamp.to_string(), meta.generation.to_string());
    annotations.insert(ANNOTATION_TRIGGERED_BY.to_string(), launch.trigger.to_string());
    if let Some(revision) = launch.revision {
        annotations.insert(ANNOTATION_REVISION.to_string(), revision.to_string());
    }

    let mut spec = template.spec.clone();
    spec.module_ref = launch.module_ref;

    Execution {
        metadata: ObjectMeta {
            generate_name: Some(template.metadata.generate_name_or(&meta.name)),
            namespace: meta.namespace.clone(),
            labels: template.metadata.labels.clone(),
            annotations,
            owner_references: vec![parent.controller_ref()],
            ..Default::default()
        },
        spec,
        ..Default::default()
    }
}

/// Copy the current Execution's identity into a parent status.
///
/// `observed_generation` only moves together with the name or phase.
/// Returns `true` if anything changed.
pub(super) fn mirror(
    last_execution_name: &mut String,
    phase: &mut Option<Phase>,
    observed_generation: &mut i64,
    exec: &Execution,
    generation: i64,
) -> bool {
    let mut changed = false;
    if *last_execution_name != exec.metadata.name {
        *last_execution_name = exec.metadata.name.clone();
        changed = true;
    }
    if *phase != Some(exec.status.phase) {
        *phase = Some(exec.status.phase);
        changed = true;
    }
    if changed {
        *observed_generation = generation;
    }
    changed
}
