use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::runtime::Filter;
use crate::store::{StateView, Store, Subscription};
use crate::Key;

type EqualsFn<R> = Arc<dyn Fn(&R, &R) -> bool + Send + Sync>;
type SubscriberFn<R> = Arc<dyn Fn(&R) + Send + Sync>;

/// Options for [`select`].
pub struct SelectOptions<R> {
    pub(crate) keys: Option<HashSet<Key>>,
    pub(crate) equals: Option<EqualsFn<R>>,
}

impl<R> Default for SelectOptions<R> {
    fn default() -> Self {
        Self {
            keys: None,
            equals: None,
        }
    }
}

impl<R> SelectOptions<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider notify cycles whose changed keys intersect this set.
    pub fn keys(mut self, keys: &[Key]) -> Self {
        self.keys = Some(keys.iter().copied().collect());
        self
    }

    /// Custom equality for the selected value (default: `PartialEq`).
    pub fn equals<F>(mut self, equals: F) -> Self
    where
        F: Fn(&R, &R) -> bool + Send + Sync + 'static,
    {
        self.equals = Some(Arc::new(equals));
        self
    }
}

struct SelectedShared<R> {
    current: Mutex<R>,
    next_sub: AtomicUsize,
    subscribers: Mutex<Vec<(usize, SubscriberFn<R>)>>,
}

impl<R: Clone> SelectedShared<R> {
    fn publish(&self, value: &R) {
        let subscribers: Vec<SubscriberFn<R>> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(value);
        }
    }
}

/// A small derived view over a store: the cached selector result plus its
/// own subscriber list. Useful for integrating with other reactive
/// systems. Dropping it detaches from the store.
pub struct Selected<R> {
    shared: Arc<SelectedShared<R>>,
    _sub: Subscription,
}

impl<R: Clone + Send + 'static> Selected<R> {
    /// The most recent selector result.
    pub fn get(&self) -> R {
        self.shared.current.lock().unwrap().clone()
    }

    /// Subscribe to changes of the derived value. The callback fires
    /// immediately with the current value, then on every change.
    pub fn subscribe<F>(&self, callback: F) -> SelectedGuard<R>
    where
        F: Fn(&R) + Send + Sync + 'static,
    {
        let callback: SubscriberFn<R> = Arc::new(callback);
        callback(&self.get());

        let id = self.shared.next_sub.fetch_add(1, Ordering::SeqCst);
        self.shared
            .subscribers
            .lock()
            .unwrap()
            .push((id, callback));
        SelectedGuard {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Explicitly detach from the store. Equivalent to dropping.
    pub fn destroy(self) {}
}

/// RAII guard for a [`Selected::subscribe`] registration.
pub struct SelectedGuard<R> {
    shared: Weak<SelectedShared<R>>,
    id: usize,
}

impl<R> Drop for SelectedGuard<R> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .subscribers
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Create a derived handle over a selector result.
///
/// # Examples
///
/// ```
/// use keywise::{select, SelectOptions, Store};
///
/// let store = Store::builder()
///     .field("a", 2i32)
///     .field("b", 3i32)
///     .action("bump_a", |cx, _args| cx.update("a", |n: i32| n + 1).map(|_| None))
///     .build();
///
/// let product = select(
///     &store,
///     |view| view.get::<i32>("a").unwrap() * view.get::<i32>("b").unwrap(),
///     SelectOptions::new(),
/// );
/// assert_eq!(product.get(), 6);
///
/// store.call("bump_a", &[]).unwrap();
/// assert_eq!(product.get(), 9);
/// ```
pub fn select<R, S>(store: &Store, selector: S, options: SelectOptions<R>) -> Selected<R>
where
    R: Clone + PartialEq + Send + 'static,
    S: Fn(&StateView) -> R + Send + Sync + 'static,
{
    let equals = options
        .equals
        .unwrap_or_else(|| Arc::new(|a: &R, b: &R| a == b));
    let keys = options.keys;

    let view = store.raw_state();
    let shared = Arc::new(SelectedShared {
        current: Mutex::new(selector(&view)),
        next_sub: AtomicUsize::new(0),
        subscribers: Mutex::new(Vec::new()),
    });

    let listener = {
        let shared = Arc::clone(&shared);
        move |changed: &HashSet<Key>| {
            if let Some(keys) = &keys {
                if !keys.iter().any(|key| changed.contains(key)) {
                    return;
                }
            }
            let next = selector(&view);
            let mut current = shared.current.lock().unwrap();
            if !(equals)(&current, &next) {
                *current = next.clone();
                drop(current);
                shared.publish(&next);
            }
        }
    };

    let sub = store.subscribe_listener(Filter::Raw, Arc::new(listener));
    Selected { shared, _sub: sub }
}
