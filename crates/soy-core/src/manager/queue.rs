use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::Duration,
};

use soy_model::ObjectKey;

/// Per-key work queue with at most one in-flight entry per key.
///
/// A key pushed while it is being reconciled is marked dirty and comes back
/// exactly once when the running pass finishes.
#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    ready: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    active: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    failures: HashMap<ObjectKey, u32>,
}

impl WorkQueue {
    pub fn push(&mut self, key: ObjectKey) {
        if self.active.contains(&key) {
            self.dirty.insert(key);
        } else if self.queued.insert(key.clone()) {
            self.ready.push_back(key);
        }
    }

    /// Next key to reconcile; it stays active until [`WorkQueue::finish`].
    pub fn pop(&mut self) -> Option<ObjectKey> {
        let key = self.ready.pop_front()?;
        self.queued.remove(&key);
        self.active.insert(key.clone());
        Some(key)
    }

    pub fn finish(&mut self, key: &ObjectKey) {
        self.active.remove(key);
        if self.dirty.remove(key) {
            self.push(key.clone());
        }
    }

    /// Record a failure and return the delay before the next attempt.
    pub fn backoff(&mut self, key: &ObjectKey, base: Duration, max: Duration) -> Duration {
        let attempt = self.failures.entry(key.clone()).or_insert(0);
        *attempt = attempt.saturating_add(1);
        let factor = 1u32.checked_shl(*attempt - 1).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(max)
    }

    pub fn forget(&mut self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ready.len()
    }
}
