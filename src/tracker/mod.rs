//! Per-subscriber access tracking.
//!
//! Records which data fields each subscriber read since its last render,
//! plus the store-wide method dependency set fed by getter-style actions.

mod tracker;

pub(crate) use tracker::{AccessTracker, Tracking};
