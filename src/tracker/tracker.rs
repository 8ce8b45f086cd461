use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::{Key, SubscriberId};

/// Who a tracked read is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tracking {
    /// Reads feed the given subscriber's dependency set.
    Subscriber(SubscriberId),
    /// Reads feed the global "no subscriber" bucket.
    Anonymous,
    /// Reads are not recorded (raw view).
    Off,
}

/// Records, per subscriber, which field keys were read since the last
/// reset. Resets happen exactly when that subscriber's render callback
/// fires, or on an explicit track-only pass.
pub(crate) struct AccessTracker {
    deps: RwLock<HashMap<SubscriberId, HashSet<Key>>>,
    // Keys read by any getter-style action during its own execution.
    // Treated as implicit dependencies of every tracked subscriber.
    method_deps: RwLock<HashSet<Key>>,
    anonymous: RwLock<HashSet<Key>>,
}

impl AccessTracker {
    pub(crate) fn new() -> Self {
        Self {
            deps: RwLock::new(HashMap::new()),
            method_deps: RwLock::new(HashSet::new()),
            anonymous: RwLock::new(HashSet::new()),
        }
    }

    /// Record a read of a data field. Action keys never reach this point.
    pub(crate) fn record_read(&self, tracking: Tracking, key: Key) {
        match tracking {
            Tracking::Subscriber(id) => {
                self.deps
                    .write()
                    .unwrap()
                    .entry(id)
                    .or_default()
                    .insert(key);
            }
            Tracking::Anonymous => {
                self.anonymous.write().unwrap().insert(key);
            }
            Tracking::Off => {}
        }
    }

    pub(crate) fn deps_of(&self, id: SubscriberId) -> HashSet<Key> {
        self.deps
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Clear a subscriber's dependency set so the next render rebuilds it.
    pub(crate) fn reset(&self, id: SubscriberId) {
        if let Some(set) = self.deps.write().unwrap().get_mut(&id) {
            set.clear();
        }
    }

    /// Drop every trace of a subscriber.
    pub(crate) fn remove(&self, id: SubscriberId) {
        self.deps.write().unwrap().remove(&id);
    }

    pub(crate) fn merge_method_deps(&self, keys: &HashSet<Key>) {
        self.method_deps.write().unwrap().extend(keys.iter().copied());
    }

    pub(crate) fn method_deps(&self) -> HashSet<Key> {
        self.method_deps.read().unwrap().clone()
    }

    pub(crate) fn anonymous_reads(&self) -> HashSet<Key> {
        self.anonymous.read().unwrap().clone()
    }
}
