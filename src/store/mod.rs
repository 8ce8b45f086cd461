//! The state container.
//!
//! A [`Store`] owns a fixed set of data fields and named actions, hands
//! out tracked views over the fields, and notifies subscribers whose
//! recorded dependencies actually changed.

mod store;
mod value;
mod view;

pub use store::{Store, StoreBuilder, Subscription};
pub use value::Value;
pub use view::StateView;

pub(crate) use store::StoreInner;
pub(crate) use value::downcast_cloned;
