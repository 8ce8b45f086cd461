use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::action::action::settle;
use crate::action::scope::Scope;
use crate::snapshot::Snapshot;
use crate::store::{StoreInner, Value};
use crate::StoreResult;

/// An in-flight asynchronous action.
///
/// Polling drives the underlying body. The synchronous prefix (everything
/// up to the first `Poll::Pending`) gets its own diff/notify cycle
/// immediately, so mutations made before the first suspension are visible
/// to subscribers without waiting for the action to complete. A second
/// capture/diff/notify cycle covers everything after the suspension point
/// and runs when the body finishes.
///
/// Subscribers that unsubscribe while the action is in flight simply stop
/// receiving deliveries; completion of the action is unaffected. If the
/// body finishes with an `Err`, the pending cycle is skipped (writes
/// already committed stay in effect) and the error is returned unchanged.
pub struct ActionFuture {
    inner: Arc<StoreInner>,
    scope: Scope,
    body: Pin<Box<dyn Future<Output = StoreResult<Option<Value>>> + Send>>,
    before: Option<Snapshot>,
    suspended: bool,
}

impl ActionFuture {
    pub(crate) fn new(
        inner: Arc<StoreInner>,
        scope: Scope,
        body: Pin<Box<dyn Future<Output = StoreResult<Option<Value>>> + Send>>,
    ) -> Self {
        Self {
            inner,
            scope,
            body,
            before: None,
            suspended: false,
        }
    }

    fn capture_before(&mut self) -> Snapshot {
        Snapshot::capture(&self.inner.fields.read().unwrap())
    }
}

impl Future for ActionFuture {
    type Output = StoreResult<Option<Value>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.before.is_none() {
            let snapshot = this.capture_before();
            this.before = Some(snapshot);
        }

        match this.body.as_mut().poll(cx) {
            Poll::Ready(Ok(returned)) => {
                let before = this.before.take().unwrap();
                let access = this.scope.take_trace();
                // The getter heuristic only applies to bodies that never
                // suspended; a resumed action is settled as a mutator.
                let returned_value = returned.is_some() && !this.suspended;
                settle(&this.inner, &before, &access, returned_value);
                Poll::Ready(Ok(returned))
            }
            Poll::Ready(Err(err)) => {
                this.before.take();
                let _ = this.scope.take_trace();
                Poll::Ready(Err(err))
            }
            Poll::Pending => {
                if !this.suspended {
                    this.suspended = true;
                    let before = this.before.take().unwrap();
                    let access = this.scope.take_trace();
                    settle(&this.inner, &before, &access, false);
                    // The second cycle starts at the suspension point.
                    let snapshot = this.capture_before();
                    this.before = Some(snapshot);
                }
                Poll::Pending
            }
        }
    }
}
