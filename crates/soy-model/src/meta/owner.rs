use serde::{Deserialize, Serialize};

/// Link from a dependent object to its owner.
///
/// At most one reference per object carries `controller = true`; that owner
/// drives the dependent's lifecycle and is the one reverse lookups match on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

impl OwnerReference {
    /// Returns `true` if this is a controller reference to the object with `uid`.
    #[inline]
    pub fn controls(&self, uid: &str) -> bool {
        self.controller && !uid.is_empty() && self.uid == uid
    }
}
