mod domain;
pub use domain::{
    ANNOTATION_MODULE_GENERATION, ANNOTATION_REVISION, ANNOTATION_STACK_GENERATION,
    ANNOTATION_TRIGGERED_BY, API_VERSION, LABEL_STACK,
};
pub use domain::{
    Action, Condition, ConditionStatus, Engine, EnvFromSource, EnvVar, EnvVarSource, KeyRef,
    LocalObjectRef, Phase, TriggeredBy, ValueFrom, set_condition,
};

mod error;
pub use error::{ModelError, ModelResult};

mod kind;
pub use kind::{
    BackendSpec, DriftDetection, Execution, ExecutionSpec, ExecutionStatus, ExecutionSummary,
    ExecutionTemplate, Job, JobSpec, JobStatus, JobTemplate, Container, Module, ModuleSpec,
    ModuleStatus, OutputSpec, OutputTarget, PodSpec, PodTemplate, Provider, ProviderRef,
    ProviderSpec, RestartPolicy, Stack, StackSpec, StackStatus, TemplateMetadata,
    UncountedTerminatedPods,
};

mod manifest;
pub use manifest::Manifest;

mod meta;
pub use meta::{ObjectKey, ObjectMeta, ObjectRef, OwnerReference, Resource};
