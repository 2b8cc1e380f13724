/// API group and version of the soyplane kinds.
pub const API_VERSION: &str = "soyplane.io/v1alpha1";

/// Generation of the owning Module at the time an Execution was created.
pub const ANNOTATION_MODULE_GENERATION: &str = "soyplane.io/module-generation";

/// Generation of the owning Stack at the time an Execution was created.
pub const ANNOTATION_STACK_GENERATION: &str = "soyplane.io/stack-generation";

/// Why an Execution was created (see [`crate::TriggeredBy`]).
pub const ANNOTATION_TRIGGERED_BY: &str = "soyplane.io/triggered-by";

/// Source revision the Execution runs against.
pub const ANNOTATION_REVISION: &str = "soyplane.io/revision";

/// Name of the Stack an Execution was created for.
pub const LABEL_STACK: &str = "soyplane.io/stack";
