//! Action instrumentation.
//!
//! Every action registered on a store is invoked through this module:
//! a before-snapshot is captured, the body runs against a [`Scope`] that
//! records reads and writes, and the touched keys are diffed to drive the
//! notification engine. Asynchronous actions get two notify cycles, one
//! for the synchronous prefix and one when the future completes.

mod action;
mod future;
mod scope;

pub(crate) use action::{invoke_async, invoke_sync, ActionKind};
pub use future::ActionFuture;
pub use scope::Scope;
