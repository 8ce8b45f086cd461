use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use crate::action::future::ActionFuture;
use crate::action::scope::{AccessTrace, Scope};
use crate::snapshot::Snapshot;
use crate::store::{StoreInner, Value};
use crate::{StoreError, StoreResult};

/// A synchronous action body.
pub(crate) type SyncActionFn =
    dyn Fn(&Scope, &[Value]) -> StoreResult<Option<Value>> + Send + Sync;

/// An asynchronous action body. The factory runs nothing until the
/// returned future is polled; the prefix up to the first suspension is
/// the "synchronous portion" of the invocation.
pub(crate) type AsyncActionFn = dyn Fn(Scope, Vec<Value>) -> Pin<Box<dyn Future<Output = StoreResult<Option<Value>>> + Send>>
    + Send
    + Sync;

pub(crate) enum ActionKind {
    Sync(Arc<SyncActionFn>),
    Async(Arc<AsyncActionFn>),
}

/// Invoke a synchronous action: snapshot, run, diff, notify.
///
/// An `Err` from the body skips the diff/notify cycle entirely; writes
/// committed before the failure stay in effect.
pub(crate) fn invoke_sync(
    inner: &Arc<StoreInner>,
    name: &str,
    args: &[Value],
) -> StoreResult<Option<Value>> {
    let body = match inner.action(name)? {
        ActionKind::Sync(body) => Arc::clone(body),
        ActionKind::Async(_) => return Err(StoreError::AsyncAction(name.into())),
    };

    trace!(action = name, "dispatch");
    let scope = Scope::new(Arc::clone(inner));
    let before = Snapshot::capture(&inner.fields.read().unwrap());

    let result = body(&scope, args);
    let access = scope.take_trace();

    match result {
        Ok(returned) => {
            settle(inner, &before, &access, returned.is_some());
            Ok(returned)
        }
        Err(err) => {
            trace!(action = name, error = %err, "action failed, notify skipped");
            Err(err)
        }
    }
}

/// Invoke an asynchronous action. The body does not start until the
/// returned [`ActionFuture`] is first polled.
pub(crate) fn invoke_async(
    inner: &Arc<StoreInner>,
    name: &str,
    args: Vec<Value>,
) -> StoreResult<ActionFuture> {
    let body = match inner.action(name)? {
        ActionKind::Async(body) => Arc::clone(body),
        ActionKind::Sync(_) => return Err(StoreError::SyncAction(name.into())),
    };

    trace!(action = name, "dispatch (async)");
    let scope = Scope::new(Arc::clone(inner));
    let future = body(scope.clone(), args);
    Ok(ActionFuture::new(Arc::clone(inner), scope, future))
}

/// Conclude one notify cycle from a before-snapshot and an access trace.
///
/// Getter heuristic: an invocation that returned a value, read at least
/// one field and wrote none is a getter. Its reads are merged into the
/// store-wide method dependency set instead of triggering notification:
/// calling a getter is not itself a state change, but whatever it read
/// becomes an implicit dependency of every tracked subscriber.
pub(crate) fn settle(
    inner: &Arc<StoreInner>,
    before: &Snapshot,
    access: &AccessTrace,
    returned_value: bool,
) {
    let is_getter = returned_value && access.writes.is_empty() && !access.reads.is_empty();
    if is_getter {
        trace!(keys = ?access.reads, "getter reads merged into method deps");
        inner.tracker.merge_method_deps(&access.reads);
        return;
    }

    let touched = access.touched();
    let changed = {
        let live = inner.fields.read().unwrap();
        before.changed_keys(&live, &touched)
    };
    trace!(?touched, ?changed, "notify cycle");
    inner.registry.notify(&inner.tracker, &changed);
}
