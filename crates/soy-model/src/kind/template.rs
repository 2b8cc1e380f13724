use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{EnvFromSource, EnvVar},
    kind::ExecutionSpec,
};

/// Metadata subset a template may carry into the objects it stamps out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
}

impl TemplateMetadata {
    /// Template `generateName`, or `<fallback>-` when unset or blank.
    pub fn generate_name_or(&self, fallback: &str) -> String {
        match self.generate_name.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => format!("{fallback}-"),
        }
    }
}

/// Blueprint for Executions created by a Module or Stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    #[serde(default)]
    pub spec: ExecutionSpec,
}

/// Overrides applied to the Job an Execution dispatches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}
