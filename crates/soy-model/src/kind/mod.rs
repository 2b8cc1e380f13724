mod execution;
pub use execution::{Execution, ExecutionSpec, ExecutionStatus, ExecutionSummary};

mod job;
pub use job::{
    Container, Job, JobSpec, JobStatus, PodSpec, PodTemplate, RestartPolicy,
    UncountedTerminatedPods,
};

mod module;
pub use module::{BackendSpec, Module, ModuleSpec, ModuleStatus, OutputSpec, OutputTarget, ProviderRef};

mod provider;
pub use provider::{Provider, ProviderSpec};

mod stack;
pub use stack::{DriftDetection, Stack, StackSpec, StackStatus};

mod template;
pub use template::{ExecutionTemplate, JobTemplate, TemplateMetadata};
