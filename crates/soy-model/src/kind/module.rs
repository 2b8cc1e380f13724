use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Phase, ValueFrom},
    kind::ExecutionTemplate,
    meta::{ObjectMeta, Resource},
};

/// Desired IaC source plus the template for the Executions that run it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Module {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ModuleSpec,
    #[serde(default)]
    pub status: ModuleStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    /// Git URL of the module source.
    pub source: String,
    /// Branch or tag to check out; HEAD when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Directory inside the checkout to run the engine in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default)]
    pub backend: BackendSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub value_sources: BTreeMap<String, ValueFrom>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub execution_template: ExecutionTemplate,
}

/// State backend configuration handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_config: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub value_sources: BTreeMap<String, ValueFrom>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
}

/// Routes one module output into Secrets or ConfigMaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub from: String,
    #[serde(default)]
    pub to: Vec<OutputTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct OutputTarget {
    pub kind: String,
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ModuleStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(rename = "lastExecution", default, skip_serializing_if = "String::is_empty")]
    pub last_execution_name: String,
}

impl ModuleSpec {
    /// Revision label recorded on Executions.
    pub fn revision(&self) -> &str {
        match self.version.as_deref() {
            Some(v) if !v.trim().is_empty() => v,
            _ => "HEAD",
        }
    }
}

impl Resource for Module {
    const KIND: &'static str = "Module";

    type Spec = ModuleSpec;
    type Status = ModuleStatus;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
    fn spec(&self) -> &ModuleSpec {
        &self.spec
    }
    fn status(&self) -> &ModuleStatus {
        &self.status
    }
    fn status_mut(&mut self) -> &mut ModuleStatus {
        &mut self.status
    }
}
