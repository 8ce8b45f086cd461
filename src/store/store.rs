use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use crate::action::{
    invoke_async, invoke_sync, ActionFuture, ActionKind, Scope,
};
use crate::runtime::{Filter, ListenerFn, Registry};
use crate::store::value::downcast_cloned;
use crate::store::view::StateView;
use crate::store::Value;
use crate::tracker::{AccessTracker, Tracking};
use crate::{Key, StoreError, StoreResult, SubscriberId};

/// Shared store internals: the live fields, the registered actions, the
/// access tracker and the subscriber registry.
pub(crate) struct StoreInner {
    pub(crate) fields: RwLock<HashMap<Key, Value>>,
    pub(crate) actions: HashMap<Key, ActionKind>,
    pub(crate) tracker: AccessTracker,
    pub(crate) registry: Registry,
}

impl StoreInner {
    /// Look up a data field, returning its canonical key and a handle.
    pub(crate) fn field(&self, key: &str) -> StoreResult<(Key, Value)> {
        let fields = self.fields.read().unwrap();
        match fields.get_key_value(key) {
            Some((canonical, value)) => Ok((*canonical, value.clone())),
            None => Err(self.missing_field(key)),
        }
    }

    /// Overwrite a data field, returning its canonical key. The field set
    /// is closed at construction; unknown keys are rejected.
    pub(crate) fn write_field(&self, key: &str, value: Value) -> StoreResult<Key> {
        let mut fields = self.fields.write().unwrap();
        let canonical = match fields.get_key_value(key) {
            Some((canonical, _)) => *canonical,
            None => return Err(self.missing_field(key)),
        };
        fields.insert(canonical, value);
        Ok(canonical)
    }

    pub(crate) fn action(&self, name: &str) -> StoreResult<&ActionKind> {
        match self.actions.get(name) {
            Some(kind) => Ok(kind),
            None if self.fields.read().unwrap().contains_key(name) => {
                Err(StoreError::NotAnAction(name.into()))
            }
            None => Err(StoreError::UnknownKey(name.into())),
        }
    }

    fn missing_field(&self, key: &str) -> StoreError {
        if self.actions.contains_key(key) {
            StoreError::NotAField(key.into())
        } else {
            StoreError::UnknownKey(key.into())
        }
    }
}

/// A fine-grained reactive state store.
///
/// A store owns a fixed set of data fields and named actions. Reads made
/// through a tracked view are recorded per subscriber; invoking an action
/// diffs exactly the keys it touched and notifies only the subscribers
/// whose recorded dependencies actually changed.
///
/// Cloning a `Store` clones a handle to the same store.
///
/// # Examples
///
/// ```
/// use keywise::Store;
///
/// let store = Store::builder()
///     .field("count", 0i32)
///     .action("inc", |cx, _args| {
///         let n: i32 = cx.get("count")?;
///         cx.set("count", n + 1)?;
///         Ok(None)
///     })
///     .build();
///
/// let sub = store.subscribe(|| println!("changed"));
/// let view = sub.view();
/// let count: i32 = view.get("count").unwrap(); // records the dependency
/// assert_eq!(count, 0);
///
/// store.call("inc", &[]).unwrap(); // prints "changed"
/// assert_eq!(store.get_raw::<i32>("count").unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    /// Start building a store.
    pub fn builder() -> StoreBuilder {
        StoreBuilder {
            fields: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    /// A tracked view whose reads land in the global "no subscriber"
    /// bucket.
    pub fn state(&self) -> StateView {
        StateView::new(Arc::clone(&self.inner), Tracking::Anonymous)
    }

    /// A tracked view attributed to the given subscriber.
    pub fn state_for(&self, id: SubscriberId) -> StateView {
        StateView::new(Arc::clone(&self.inner), Tracking::Subscriber(id))
    }

    /// The untracked escape hatch: reads through this view are never
    /// recorded anywhere.
    pub fn raw_state(&self) -> StateView {
        StateView::new(Arc::clone(&self.inner), Tracking::Off)
    }

    /// Read a field without tracking, cloning the payload out.
    pub fn get_raw<T: Any + Clone>(&self, key: &str) -> StoreResult<T> {
        let (_, value) = self.inner.field(key)?;
        downcast_cloned(key, &value)
    }

    /// Invoke a synchronous action by name.
    ///
    /// Exactly one notify cycle runs per invocation, after the body
    /// returns. An `Err` from the body propagates unchanged and skips the
    /// cycle; writes already committed stay in effect.
    pub fn call(&self, name: &str, args: &[Value]) -> StoreResult<Option<Value>> {
        invoke_sync(&self.inner, name, args)
    }

    /// Invoke an asynchronous action by name.
    ///
    /// The body starts on first poll of the returned future. See
    /// [`ActionFuture`] for the two-cycle delivery contract.
    pub fn call_async(&self, name: &str, args: Vec<Value>) -> StoreResult<ActionFuture> {
        invoke_async(&self.inner, name, args)
    }

    /// Register a render callback with dependency tracking.
    ///
    /// The callback fires, synchronously and in registration order, when
    /// an action changes at least one field the subscriber read since its
    /// last render. Firing resets the dependency set, so each render
    /// rebuilds it from the reads it actually performs. A subscriber that
    /// has read nothing never fires.
    pub fn subscribe<F>(&self, render: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_listener(Filter::Tracked, Arc::new(move |_| render()))
    }

    /// Register a render callback with a static key filter instead of
    /// tracked dependencies.
    pub fn subscribe_keys<F>(&self, render: F, keys: &[Key]) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_listener(
            Filter::Keys(keys.iter().copied().collect()),
            Arc::new(move |_| render()),
        )
    }

    pub(crate) fn subscribe_listener(
        &self,
        filter: Filter,
        listener: Arc<ListenerFn>,
    ) -> Subscription {
        let id = self.inner.registry.add(filter, listener);
        Subscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// The data field keys, in no particular order.
    pub fn field_keys(&self) -> Vec<Key> {
        self.inner.fields.read().unwrap().keys().copied().collect()
    }

    /// The action keys, in no particular order.
    pub fn action_keys(&self) -> Vec<Key> {
        self.inner.actions.keys().copied().collect()
    }
}

/// Builder for [`Store`].
///
/// Field and action key sets are disjoint; registering a key as one kind
/// removes any earlier registration as the other, so the last entry wins
/// exactly as in an object literal.
pub struct StoreBuilder {
    fields: HashMap<Key, Value>,
    actions: HashMap<Key, ActionKind>,
}

impl StoreBuilder {
    /// Declare a data field with its initial payload.
    pub fn field<T>(mut self, key: Key, payload: T) -> Self
    where
        T: Any + Send + Sync + PartialEq,
    {
        self.actions.remove(key);
        self.fields.insert(key, Value::new(payload));
        self
    }

    /// Declare a data field from an existing [`Value`] handle.
    pub fn field_value(mut self, key: Key, value: Value) -> Self {
        self.actions.remove(key);
        self.fields.insert(key, value);
        self
    }

    /// Register a synchronous action.
    pub fn action<F>(mut self, key: Key, body: F) -> Self
    where
        F: Fn(&Scope, &[Value]) -> StoreResult<Option<Value>> + Send + Sync + 'static,
    {
        self.fields.remove(key);
        self.actions.insert(key, ActionKind::Sync(Arc::new(body)));
        self
    }

    /// Register an asynchronous action.
    ///
    /// The factory receives an owned [`Scope`] to move into the future.
    pub fn action_async<F>(mut self, key: Key, body: F) -> Self
    where
        F: Fn(Scope, Vec<Value>) -> Pin<Box<dyn Future<Output = StoreResult<Option<Value>>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        self.fields.remove(key);
        self.actions.insert(key, ActionKind::Async(Arc::new(body)));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Store {
        Store {
            inner: Arc::new(StoreInner {
                fields: RwLock::new(self.fields),
                actions: self.actions,
                tracker: AccessTracker::new(),
                registry: Registry::new(),
            }),
        }
    }
}

/// RAII guard for a registered subscriber.
///
/// Dropping the guard removes the subscriber, its dependency set and its
/// callback from every registry. An action already in flight then simply
/// has nobody to notify, never an error.
pub struct Subscription {
    id: SubscriberId,
    inner: Arc<StoreInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// A tracked view attributed to this subscriber.
    pub fn view(&self) -> StateView {
        StateView::new(Arc::clone(&self.inner), Tracking::Subscriber(self.id))
    }

    /// Reset the dependency set ahead of a seeding read pass, e.g. to
    /// register interest before the first real render.
    pub fn track_only(&self) {
        self.inner.tracker.reset(self.id);
    }

    /// The field keys this subscriber has read since its last reset.
    pub fn dependencies(&self) -> HashSet<Key> {
        self.inner.tracker.deps_of(self.id)
    }

    /// Explicitly remove the subscriber. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.registry.remove(self.id);
        self.inner.tracker.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_store() -> Store {
        Store::builder()
            .field("count", 0i32)
            .action("inc", |cx, _args| {
                let n: i32 = cx.get("count")?;
                cx.set("count", n + 1)?;
                Ok(None)
            })
            .build()
    }

    #[test]
    fn call_mutates_and_notifies_dependents() {
        let store = counter_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let sub = store.subscribe(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        let _: i32 = sub.view().get("count").unwrap();

        store.call("inc", &[]).unwrap();
        assert_eq!(store.get_raw::<i32>("count").unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_action() {
        let store = counter_store();
        assert_eq!(
            store.call("missing", &[]).unwrap_err(),
            StoreError::UnknownKey("missing".into())
        );
        assert_eq!(
            store.call("count", &[]).unwrap_err(),
            StoreError::NotAnAction("count".into())
        );
    }

    #[test]
    fn last_entry_wins_across_kinds() {
        let store = Store::builder()
            .action("x", |_cx, _args| Ok(None))
            .field("x", 1i32)
            .build();
        assert_eq!(store.get_raw::<i32>("x").unwrap(), 1);
        assert!(store.action_keys().is_empty());
    }

    #[test]
    fn drop_unsubscribes() {
        let store = counter_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let sub = store.subscribe(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        let _: i32 = sub.view().get("count").unwrap();
        assert_eq!(store.subscriber_count(), 1);

        drop(sub);
        assert_eq!(store.subscriber_count(), 0);
        store.call("inc", &[]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscribe_keys_ignores_tracked_reads() {
        let store = Store::builder()
            .field("a", 0i32)
            .field("b", 0i32)
            .action("inc_a", |cx, _args| {
                cx.update("a", |n: i32| n + 1)?;
                Ok(None)
            })
            .build();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        // Filters on `b` only; reading `a` through the view changes nothing.
        let sub = store.subscribe_keys(
            move || {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            &["b"],
        );
        let _: i32 = sub.view().get("a").unwrap();

        store.call("inc_a", &[]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn state_for_attributes_reads_to_the_subscriber() {
        let store = counter_store();
        let sub = store.subscribe(|| {});

        let _: i32 = store.state_for(sub.id()).get("count").unwrap();
        assert_eq!(sub.dependencies(), ["count"].into_iter().collect());
    }

    #[test]
    fn failed_action_keeps_partial_writes_but_skips_notify() {
        let store = Store::builder()
            .field("a", 0i32)
            .action("boom", |cx, _args| {
                cx.set("a", 1)?;
                Err(StoreError::UnknownKey("deliberate".into()))
            })
            .build();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let sub = store.subscribe(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        let _: i32 = sub.view().get("a").unwrap();

        assert!(store.call("boom", &[]).is_err());
        assert_eq!(store.get_raw::<i32>("a").unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
