use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelError, ModelResult},
    kind::{Execution, Module, Provider, Stack},
    meta::{ObjectKey, ObjectMeta, Resource},
};

/// Namespace assumed for manifests that do not set one.
const DEFAULT_NAMESPACE: &str = "default";

/// A single user-authored document, dispatched on its `kind` field.
///
/// `apiVersion` is accepted and ignored on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Manifest {
    Module(Module),
    Execution(Execution),
    Stack(Stack),
    Provider(Provider),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Module(_) => Module::KIND,
            Manifest::Execution(_) => Execution::KIND,
            Manifest::Stack(_) => Stack::KIND,
            Manifest::Provider(_) => Provider::KIND,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Manifest::Module(m) => m.meta(),
            Manifest::Execution(e) => e.meta(),
            Manifest::Stack(s) => s.meta(),
            Manifest::Provider(p) => p.meta(),
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Manifest::Module(m) => m.meta_mut(),
            Manifest::Execution(e) => e.meta_mut(),
            Manifest::Stack(s) => s.meta_mut(),
            Manifest::Provider(p) => p.meta_mut(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    /// Fill the default namespace and reject documents the store cannot accept.
    ///
    /// Server-owned metadata (`uid`, `resourceVersion`, `generation`) is cleared.
    pub fn normalize(mut self) -> ModelResult<Self> {
        let kind = self.kind();
        let meta = self.meta_mut();

        if meta.name.trim().is_empty() && meta.generate_name.is_none() {
            return Err(ModelError::InvalidManifest(format!(
                "{kind} has neither name nor generateName"
            )));
        }
        if meta.namespace.trim().is_empty() {
            meta.namespace = DEFAULT_NAMESPACE.to_string();
        }
        meta.uid.clear();
        meta.resource_version.clear();
        meta.generation = 0;
        Ok(self)
    }
}
