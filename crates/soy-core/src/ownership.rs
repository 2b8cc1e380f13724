//! Owned-children lookup and newest-first selection.
use std::cmp::Ordering;

use soy_model::{ObjectMeta, Resource};

/// Returns `true` if `child` names `owner` as its controlling owner.
///
/// Non-controller references never match, and objects in another namespace
/// are never considered children.
pub fn is_controlled_by(child: &ObjectMeta, owner: &ObjectMeta) -> bool {
    child.namespace == owner.namespace
        && child
            .owner_references
            .iter()
            .any(|r| r.controls(&owner.uid))
}

/// Keep only the candidates controlled by `owner`.
pub fn filter_owned<K: Resource>(owner: &ObjectMeta, candidates: Vec<K>) -> Vec<K> {
    candidates
        .into_iter()
        .filter(|c| is_controlled_by(c.meta(), owner))
        .collect()
}

/// Newest first: creation time descending, then name descending so the
/// order is total even when timestamps tie.
fn newest_first<K: Resource>(a: &K, b: &K) -> Ordering {
    let (a, b) = (a.meta(), b.meta());
    b.creation_timestamp
        .cmp(&a.creation_timestamp)
        .then_with(|| b.name.cmp(&a.name))
}

/// The most recently created object, if any.
pub fn newest<K: Resource>(mut objects: Vec<K>) -> Option<K> {
    objects.sort_by(newest_first);
    objects.into_iter().next()
}

/// Split into the newest object and everything older.
pub fn split_newest<K: Resource>(mut objects: Vec<K>) -> Option<(K, Vec<K>)> {
    objects.sort_by(newest_first);
    let mut iter = objects.into_iter();
    let head = iter.next()?;
    Some((head, iter.collect()))
}
