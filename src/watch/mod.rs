//! Selector-based subscriptions layered on the key-filtering core.
//!
//! [`watch`] fires a callback when a derived value changes, with optional
//! key filtering, custom equality, and debounce/throttle rate limiting.
//! [`on`] subscribes to an explicit key set, and [`select`] builds a
//! small derived handle with `get()` and its own subscriber list.

mod select;
mod watch;

pub use select::{select, SelectOptions, Selected, SelectedGuard};
pub use watch::{on, watch, WatchHandle, WatchOptions};
