//! # Keywise
//!
//! A fine-grained reactive state store for Rust.
//!
//! A [`Store`] combines data fields and named actions in one container.
//! Reads performed through a tracked view are recorded per subscriber;
//! invoking an action diffs exactly the keys it touched and notifies only
//! the subscribers whose recorded dependencies actually changed.
//!
//! ## Store (data + actions)
//!
//! - [`Store`] - the state container, built with [`Store::builder`]
//! - [`Scope`] - the mutable field view handed to action bodies
//! - [`StateView`] - a read-tracked view over the data fields
//! - [`Subscription`] - RAII guard for a registered render callback
//!
//! ## Selector layer
//!
//! - [`watch`] - derived-value subscriptions with key filtering,
//!   custom equality and debounce/throttle
//! - [`on`] - explicit key-set subscriptions
//! - [`select`] - a derived handle with `get()` and its own subscribers

pub mod error;
pub mod store;
pub mod watch;

mod action;
mod runtime;
mod snapshot;
mod tracker;

// Re-export main types for convenience
pub use action::{ActionFuture, Scope};
pub use error::{StoreError, StoreResult};
pub use store::{StateView, Store, StoreBuilder, Subscription, Value};
pub use watch::{
    on, select, watch, SelectOptions, Selected, SelectedGuard, WatchHandle, WatchOptions,
};

/// Field and action names. The key set of a store is fixed at
/// construction.
pub type Key = &'static str;

/// Opaque subscriber identity, one per registered consumer.
pub type SubscriberId = usize;
