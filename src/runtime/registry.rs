use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::tracker::AccessTracker;
use crate::{Key, SubscriberId};

/// Internal listener signature. Public `subscribe` wraps a no-argument
/// render callback; the selector layer consumes the changed-key set.
pub(crate) type ListenerFn = dyn Fn(&HashSet<Key>) + Send + Sync;

/// How a subscriber's interest is determined on each notify pass.
#[derive(Clone)]
pub(crate) enum Filter {
    /// Fire when (tracked deps ∪ method deps) intersects the changed set.
    Tracked,
    /// Fire when the literal key set intersects the changed set.
    Keys(HashSet<Key>),
    /// Fire on every non-empty changed set (selector layer does its own
    /// filtering).
    Raw,
}

struct Entry {
    id: SubscriberId,
    filter: Filter,
    listener: Arc<ListenerFn>,
}

/// Subscriber registry, kept in registration order.
pub(crate) struct Registry {
    next_id: AtomicUsize,
    entries: RwLock<Vec<Entry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, filter: Filter, listener: Arc<ListenerFn>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.write().unwrap().push(Entry {
            id,
            filter,
            listener,
        });
        trace!(subscriber = id, "subscribe");
        id
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.entries.write().unwrap().retain(|entry| entry.id != id);
        trace!(subscriber = id, "unsubscribe");
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.read().unwrap().iter().any(|entry| entry.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Deliver one notify cycle for the given changed-key set.
    ///
    /// Callbacks run synchronously, in registration order, outside every
    /// lock, so a callback may freely read the store, dispatch actions,
    /// or unsubscribe. A subscriber removed mid-pass is skipped.
    pub(crate) fn notify(&self, tracker: &AccessTracker, changed: &HashSet<Key>) {
        if changed.is_empty() {
            return;
        }

        let pending: Vec<(SubscriberId, Filter, Arc<ListenerFn>)> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|entry| (entry.id, entry.filter.clone(), Arc::clone(&entry.listener)))
            .collect();

        for (id, filter, listener) in pending {
            if !self.contains(id) {
                continue;
            }

            let fire = match &filter {
                Filter::Tracked => {
                    let mut effective = tracker.deps_of(id);
                    effective.extend(tracker.method_deps());
                    // An empty effective set means this subscriber has not
                    // read anything yet; it can never fire.
                    !effective.is_empty() && effective.iter().any(|key| changed.contains(key))
                }
                Filter::Keys(keys) => keys.iter().any(|key| changed.contains(key)),
                Filter::Raw => true,
            };

            if fire {
                if matches!(filter, Filter::Tracked) {
                    // Reset before invoking so reads performed during the
                    // render repopulate a fresh dependency set.
                    tracker.reset(id);
                }
                trace!(subscriber = id, ?changed, "render");
                listener(changed);
            }
        }
    }
}
