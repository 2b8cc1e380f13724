use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::ValueFrom,
    meta::{ObjectMeta, Resource},
};

/// Reusable provider configuration referenced by Modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Provider {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ProviderSpec,
    #[serde(skip)]
    status: (),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub value_sources: BTreeMap<String, ValueFrom>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_config: String,
    /// Templated provider block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl Provider {
    pub fn new(metadata: ObjectMeta, spec: ProviderSpec) -> Self {
        Self {
            metadata,
            spec,
            status: (),
        }
    }
}

impl Resource for Provider {
    const KIND: &'static str = "Provider";

    type Spec = ProviderSpec;
    type Status = ();

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
    fn spec(&self) -> &ProviderSpec {
        &self.spec
    }
    fn status(&self) -> &() {
        &self.status
    }
    fn status_mut(&mut self) -> &mut () {
        &mut self.status
    }
}
