use std::any::Any;
use std::sync::Arc;

use crate::action::{invoke_async, invoke_sync, ActionFuture};
use crate::store::value::downcast_cloned;
use crate::store::{StoreInner, Value};
use crate::tracker::Tracking;
use crate::{StoreResult, SubscriberId};

/// A tracked view over a store's data fields.
///
/// Reads of data fields are reported to the access tracker under the
/// view's tracking mode: attributed to a subscriber, dumped into the
/// anonymous bucket, or (for the raw view) not recorded at all. Actions
/// are invocable through the view but are never recorded as reads;
/// functions are not reactive state.
#[derive(Clone)]
pub struct StateView {
    inner: Arc<StoreInner>,
    tracking: Tracking,
}

impl StateView {
    pub(crate) fn new(inner: Arc<StoreInner>, tracking: Tracking) -> Self {
        Self { inner, tracking }
    }

    /// Read a field, cloning the payload out and recording the read.
    pub fn get<T: Any + Clone>(&self, key: &str) -> StoreResult<T> {
        let value = self.value(key)?;
        downcast_cloned(key, &value)
    }

    /// Read a field as a raw [`Value`] handle, recording the read.
    pub fn value(&self, key: &str) -> StoreResult<Value> {
        let (canonical, value) = self.inner.field(key)?;
        self.inner.tracker.record_read(self.tracking, canonical);
        Ok(value)
    }

    /// Whether the key names a data field.
    pub fn has_field(&self, key: &str) -> bool {
        self.inner.fields.read().unwrap().contains_key(key)
    }

    /// Invoke a synchronous action. Not recorded as a read.
    pub fn call(&self, name: &str, args: &[Value]) -> StoreResult<Option<Value>> {
        invoke_sync(&self.inner, name, args)
    }

    /// Invoke an asynchronous action. Not recorded as a read.
    pub fn call_async(&self, name: &str, args: Vec<Value>) -> StoreResult<ActionFuture> {
        invoke_async(&self.inner, name, args)
    }

    /// The subscriber this view reports reads for, if any.
    pub fn subscriber(&self) -> Option<SubscriberId> {
        match self.tracking {
            Tracking::Subscriber(id) => Some(id),
            _ => None,
        }
    }
}
