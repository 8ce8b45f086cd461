use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::store::{downcast_cloned, StoreInner, Value};
use crate::{Key, StoreResult};

/// Reads and writes recorded during one action invocation.
#[derive(Default)]
pub(crate) struct AccessTrace {
    pub(crate) reads: HashSet<Key>,
    pub(crate) writes: HashSet<Key>,
}

impl AccessTrace {
    /// Touched keys: everything read or written.
    pub(crate) fn touched(&self) -> HashSet<Key> {
        self.reads.union(&self.writes).copied().collect()
    }
}

/// The mutable view of the data fields handed to an action body.
///
/// Reads and writes go straight to the live store and are recorded in the
/// invocation's access trace; writes commit immediately, so a later error
/// does not roll them back. A scope only reaches data fields; actions
/// cannot invoke sibling actions through it.
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
/// store.call("inc", &[]).unwrap();
/// assert_eq!(store.get_raw::<i32>("count").unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<StoreInner>,
    trace: Arc<Mutex<AccessTrace>>,
}

impl Scope {
    pub(crate) fn new(inner: Arc<StoreInner>) -> Self {
        Self {
            inner,
            trace: Arc::new(Mutex::new(AccessTrace::default())),
        }
    }

    /// Read a field, cloning the payload out.
    pub fn get<T: Any + Clone>(&self, key: &str) -> StoreResult<T> {
        let value = self.value(key)?;
        downcast_cloned(key, &value)
    }

    /// Read a field as a raw [`Value`] handle.
    ///
    /// Writing the same handle back via [`set_value`](Self::set_value) is
    /// never treated as a change.
    pub fn value(&self, key: &str) -> StoreResult<Value> {
        let (key, value) = self.inner.field(key)?;
        self.trace.lock().unwrap().reads.insert(key);
        Ok(value)
    }

    /// Write a field. Commits immediately to the live store.
    pub fn set<T>(&self, key: &str, payload: T) -> StoreResult<()>
    where
        T: Any + Send + Sync + PartialEq,
    {
        self.set_value(key, Value::new(payload))
    }

    /// Write a field from a raw [`Value`] handle.
    pub fn set_value(&self, key: &str, value: Value) -> StoreResult<()> {
        let key = self.inner.write_field(key, value)?;
        self.trace.lock().unwrap().writes.insert(key);
        Ok(())
    }

    /// Read-modify-write convenience. Records both the read and the write.
    pub fn update<T, F>(&self, key: &str, f: F) -> StoreResult<()>
    where
        T: Any + Clone + Send + Sync + PartialEq,
        F: FnOnce(T) -> T,
    {
        let current: T = self.get(key)?;
        self.set(key, f(current))
    }

    /// Drain the access trace accumulated so far.
    ///
    /// Used by the instrumentation between the synchronous and resumed
    /// portions of an asynchronous action.
    pub(crate) fn take_trace(&self) -> AccessTrace {
        std::mem::take(&mut *self.trace.lock().unwrap())
    }
}
