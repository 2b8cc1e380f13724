use std::fmt::Debug;

use crate::{
    domain::API_VERSION,
    meta::{ObjectKey, ObjectMeta, OwnerReference},
};

/// Common surface of every stored kind.
///
/// Spec and status are split so the store can version them independently:
/// spec edits bump `generation`, status writes do not.
pub trait Resource: Clone + Debug + Send + Sync + 'static {
    const KIND: &'static str;
    const API_VERSION: &'static str = API_VERSION;

    type Spec: Clone + PartialEq + Send + Sync;
    type Status: Clone + PartialEq + Default + Send + Sync;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    fn spec(&self) -> &Self::Spec;
    fn status(&self) -> &Self::Status;
    fn status_mut(&mut self) -> &mut Self::Status;

    fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    /// Build a controller owner reference pointing at `self`.
    fn controller_ref(&self) -> OwnerReference {
        let meta = self.meta();
        OwnerReference {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            name: meta.name.clone(),
            uid: meta.uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}
