mod action;
pub use action::Action;

mod condition;
pub use condition::{Condition, ConditionStatus, set_condition};

mod constants;
pub use constants::{
    ANNOTATION_MODULE_GENERATION, ANNOTATION_REVISION, ANNOTATION_STACK_GENERATION,
    ANNOTATION_TRIGGERED_BY, API_VERSION, LABEL_STACK,
};

mod engine;
pub use engine::Engine;

mod env;
pub use env::{EnvFromSource, EnvVar, EnvVarSource, LocalObjectRef};

mod phase;
pub use phase::Phase;

mod trigger;
pub use trigger::TriggeredBy;

mod value;
pub use value::{KeyRef, ValueFrom};
