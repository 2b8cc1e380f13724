use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Action, Condition, Engine, Phase},
    kind::JobTemplate,
    meta::{ObjectMeta, ObjectRef, Resource},
};

/// One concrete plan or apply run of a Module, backed by a Job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Execution {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ExecutionSpec,
    #[serde(default)]
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub module_ref: ObjectRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_template: Option<JobTemplate>,
    #[serde(default)]
    pub engine: Engine,
}

/// Outcome of a run as shown on Executions and copied onto Stacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub triggered_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(flatten)]
    pub execution: ExecutionSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Resource for Execution {
    const KIND: &'static str = "Execution";

    type Spec = ExecutionSpec;
    type Status = ExecutionStatus;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
    fn spec(&self) -> &ExecutionSpec {
        &self.spec
    }
    fn status(&self) -> &ExecutionStatus {
        &self.status
    }
    fn status_mut(&mut self) -> &mut ExecutionStatus {
        &mut self.status
    }
}
