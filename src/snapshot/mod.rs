//! Shallow before-snapshots and the touched-key diff.
//!
//! A snapshot captures every field handle at one instant and lives for at
//! most one notify cycle. The diff only inspects the keys an action
//! actually touched.

mod snapshot;

pub(crate) use snapshot::Snapshot;
