//! The notification engine.
//!
//! Owns the subscriber registry and decides, per subscriber, whether a
//! finished action warrants a render callback: effective dependencies
//! (tracked reads plus the method dependency set, or an explicit key
//! filter) must intersect the changed-key set.

mod registry;

pub(crate) use registry::{Filter, ListenerFn, Registry};
