use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::runtime::Filter;
use crate::store::{StateView, Store, Subscription};
use crate::Key;

type EqualsFn<R> = Arc<dyn Fn(&R, &R) -> bool + Send + Sync>;
type OnChangeFn<R> = Arc<dyn Fn(&R, &HashSet<Key>) + Send + Sync>;

/// Options for [`watch`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use keywise::WatchOptions;
///
/// let options: WatchOptions<i32> = WatchOptions::new()
///     .keys(&["count"])
///     .throttle(Duration::from_millis(50))
///     .fire_immediately();
/// ```
pub struct WatchOptions<R> {
    pub(crate) keys: Option<HashSet<Key>>,
    pub(crate) equals: Option<EqualsFn<R>>,
    pub(crate) debounce: Option<Duration>,
    pub(crate) throttle: Option<Duration>,
    pub(crate) fire_immediately: bool,
}

impl<R> Default for WatchOptions<R> {
    fn default() -> Self {
        Self {
            keys: None,
            equals: None,
            debounce: None,
            throttle: None,
            fire_immediately: false,
        }
    }
}

impl<R> WatchOptions<R> {
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

    /// Trail fires by this duration, collapsing bursts into the last one.
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Drop fires arriving within this window of the previous one.
    pub fn throttle(mut self, window: Duration) -> Self {
        self.throttle = Some(window);
        self
    }

    /// Invoke the callback once at registration with the current value.
    pub fn fire_immediately(mut self) -> Self {
        self.fire_immediately = true;
        self
    }
}

/// Throttle window and optional debounce worker shared between the store
/// listener and the returned handle.
struct RateLimiter<R> {
    throttle: Option<Duration>,
    // Shared with the debounce worker, which stamps it on delivery.
    last_fired: Arc<Mutex<Option<Instant>>>,
    // Present only when debouncing; the worker thread owns the receiver.
    tx: Option<Mutex<mpsc::Sender<(R, HashSet<Key>)>>>,
    on_change: OnChangeFn<R>,
}

impl<R> RateLimiter<R> {
    fn fire(&self, value: R, changed: HashSet<Key>) {
        if let Some(window) = self.throttle {
            let last = self.last_fired.lock().unwrap();
            if let Some(at) = *last {
                if at.elapsed() < window {
                    trace!("watch fire throttled");
                    return;
                }
            }
        }

        if let Some(tx) = &self.tx {
            // Debounced: hand off to the worker, which restarts its timer.
            let _ = tx.lock().unwrap().send((value, changed));
            return;
        }

        *self.last_fired.lock().unwrap() = Some(Instant::now());
        (self.on_change)(&value, &changed);
    }
}

/// Active [`watch`] registration. Dropping it stops delivery and discards
/// any pending debounced fire.
pub struct WatchHandle {
    stopped: Arc<AtomicBool>,
    _sub: Subscription,
}

impl WatchHandle {
    /// Explicitly stop watching. Equivalent to dropping the handle.
    pub fn stop(self) {}
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        // Raced debounce timers check this before firing.
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Subscribe to a selector result with optional key filtering, custom
/// equality and debounce/throttle rate limiting.
///
/// The callback fires only when the key filter (if any) intersects the
/// changed-key set AND the selected value differs from the previous one
/// per the equality function.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use keywise::{watch, Store, WatchOptions};
///
/// let store = Store::builder()
///     .field("count", 0i32)
///     .action("inc", |cx, _args| cx.update("count", |n: i32| n + 1).map(|_| None))
///     .build();
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let seen_clone = seen.clone();
/// let _handle = watch(
///     &store,
///     |view| view.get::<i32>("count").unwrap(),
///     move |value, _changed| seen_clone.lock().unwrap().push(*value),
///     WatchOptions::new(),
/// );
///
/// store.call("inc", &[]).unwrap();
/// store.call("inc", &[]).unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
/// ```
pub fn watch<R, S, F>(store: &Store, selector: S, on_change: F, options: WatchOptions<R>) -> WatchHandle
where
    R: Clone + PartialEq + Send + 'static,
    S: Fn(&StateView) -> R + Send + Sync + 'static,
    F: Fn(&R, &HashSet<Key>) + Send + Sync + 'static,
{
    let equals = options
        .equals
        .unwrap_or_else(|| Arc::new(|a: &R, b: &R| a == b));
    let on_change: OnChangeFn<R> = Arc::new(on_change);
    let stopped = Arc::new(AtomicBool::new(false));
    let last_fired = Arc::new(Mutex::new(None));

    let view = store.raw_state();
    let current = Arc::new(Mutex::new(selector(&view)));

    if options.fire_immediately {
        on_change(&*current.lock().unwrap(), &HashSet::new());
    }

    let tx = options.debounce.map(|delay| {
        let (tx, rx) = mpsc::channel::<(R, HashSet<Key>)>();
        let on_change = Arc::clone(&on_change);
        let stopped = Arc::clone(&stopped);
        let last_fired = Arc::clone(&last_fired);
        thread::spawn(move || debounce_worker(rx, delay, on_change, last_fired, stopped));
        Mutex::new(tx)
    });

    let limiter = Arc::new(RateLimiter {
        throttle: options.throttle,
        last_fired,
        tx,
        on_change,
    });

    let keys = options.keys;
    let listener = {
        let limiter = Arc::clone(&limiter);
        move |changed: &HashSet<Key>| {
            if let Some(keys) = &keys {
                if !keys.iter().any(|key| changed.contains(key)) {
                    return;
                }
            }
            let next = selector(&view);
            let mut current = current.lock().unwrap();
            if !(equals)(&current, &next) {
                *current = next.clone();
                drop(current);
                limiter.fire(next, changed.clone());
            }
        }
    };

    let sub = store.subscribe_listener(Filter::Raw, Arc::new(listener));
    WatchHandle {
        stopped,
        _sub: sub,
    }
}

fn debounce_worker<R>(
    rx: mpsc::Receiver<(R, HashSet<Key>)>,
    delay: Duration,
    on_change: OnChangeFn<R>,
    last_fired: Arc<Mutex<Option<Instant>>>,
    stopped: Arc<AtomicBool>,
) {
    while let Ok(mut pending) = rx.recv() {
        loop {
            match rx.recv_timeout(delay) {
                Ok(next) => pending = next,
                Err(RecvTimeoutError::Timeout) => {
                    if !stopped.load(Ordering::SeqCst) {
                        // The throttle window opens at actual delivery,
                        // not at hand-off.
                        *last_fired.lock().unwrap() = Some(Instant::now());
                        let (value, changed) = pending;
                        on_change(&value, &changed);
                    }
                    break;
                }
                // Cancelled: discard the pending fire.
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

/// Subscribe to explicit keys; the handler receives the changed-key set.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use keywise::{on, Store};
///
/// let store = Store::builder()
///     .field("a", 0i32)
///     .field("b", 0i32)
///     .action("inc_a", |cx, _args| cx.update("a", |n: i32| n + 1).map(|_| None))
///     .build();
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let hits_clone = hits.clone();
/// let _sub = on(&store, &["b"], move |_changed| {
///     hits_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// store.call("inc_a", &[]).unwrap();
/// assert_eq!(hits.load(Ordering::SeqCst), 0);
/// ```
pub fn on<F>(store: &Store, keys: &[Key], handler: F) -> Subscription
where
    F: Fn(&HashSet<Key>) + Send + Sync + 'static,
{
    store.subscribe_listener(
        Filter::Keys(keys.iter().copied().collect()),
        Arc::new(handler),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn two_field_store() -> Store {
        Store::builder()
            .field("a", 0i32)
            .field("b", 0i32)
            .action("inc_a", |cx, _args| {
                cx.update("a", |n: i32| n + 1)?;
                Ok(None)
            })
            .action("inc_b", |cx, _args| {
                cx.update("b", |n: i32| n + 1)?;
                Ok(None)
            })
            .build()
    }

    #[test]
    fn watch_fires_on_selected_change_only() {
        let store = two_field_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let _handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |_value, _changed| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::new(),
        );

        store.call("inc_b", &[]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        store.call("inc_a", &[]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_filter_short_circuits_the_selector() {
        let store = two_field_store();
        let selector_runs = Arc::new(AtomicUsize::new(0));
        let selector_runs_clone = selector_runs.clone();

        let _handle = watch(
            &store,
            move |view| {
                selector_runs_clone.fetch_add(1, Ordering::SeqCst);
                view.get::<i32>("a").unwrap()
            },
            |_value, _changed| {},
            WatchOptions::new().keys(&["a"]),
        );
        let baseline = selector_runs.load(Ordering::SeqCst);

        store.call("inc_b", &[]).unwrap();
        assert_eq!(selector_runs.load(Ordering::SeqCst), baseline);
    }

    #[test]
    fn fire_immediately_reports_the_current_value() {
        let store = two_field_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |value, changed| {
                assert!(changed.is_empty());
                seen_clone.lock().unwrap().push(*value);
            },
            WatchOptions::new().fire_immediately(),
        );

        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn custom_equality_suppresses_fires() {
        let store = two_field_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        // Only parity matters; 0 -> 2 is not a change.
        let _handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |_value, _changed| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::new().equals(|a, b| a % 2 == b % 2),
        );

        store.call("inc_a", &[]).unwrap(); // 1: parity flipped
        store.call("inc_a", &[]).unwrap(); // 2: flipped again
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn throttle_drops_fires_inside_the_window() {
        let store = two_field_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let _handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |_value, _changed| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::new().throttle(Duration::from_secs(60)),
        );

        store.call("inc_a", &[]).unwrap();
        store.call("inc_a", &[]).unwrap();
        store.call("inc_a", &[]).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debounce_collapses_a_burst_into_the_last_value() {
        let store = two_field_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |value, _changed| {
                seen_clone.lock().unwrap().push(*value);
            },
            WatchOptions::new().debounce(Duration::from_millis(30)),
        );

        store.call("inc_a", &[]).unwrap();
        store.call("inc_a", &[]).unwrap();
        store.call("inc_a", &[]).unwrap();
        assert!(seen.lock().unwrap().is_empty());

        thread::sleep(Duration::from_millis(120));
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn throttle_applies_to_debounced_deliveries() {
        let store = two_field_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let _handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |_value, _changed| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::new()
                .debounce(Duration::from_millis(20))
                .throttle(Duration::from_secs(60)),
        );

        // First burst settles and delivers once.
        store.call("inc_a", &[]).unwrap();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // A later burst lands inside the throttle window and is dropped.
        store.call("inc_a", &[]).unwrap();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_handle_discards_a_pending_debounce() {
        let store = two_field_store();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let handle = watch(
            &store,
            |view| view.get::<i32>("a").unwrap(),
            move |_value, _changed| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::new().debounce(Duration::from_millis(30)),
        );

        store.call("inc_a", &[]).unwrap();
        handle.stop();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn on_receives_the_changed_keys() {
        let store = two_field_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _sub = on(&store, &["a"], move |changed| {
            let mut keys: Vec<_> = changed.iter().copied().collect();
            keys.sort_unstable();
            seen_clone.lock().unwrap().push(keys);
        });

        store.call("inc_a", &[]).unwrap();
        store.call("inc_b", &[]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![vec!["a"]]);
    }
}
