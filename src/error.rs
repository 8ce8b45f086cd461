use thiserror::Error;

/// Errors produced by store lookups and action dispatch.
///
/// Errors returned from an action body propagate through
/// [`Store::call`](crate::Store::call) unchanged; a failed action skips its
/// notify cycle but keeps any writes it already committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key names neither a data field nor an action.
    #[error("unknown key `{0}`")]
    UnknownKey(String),

    /// The key names an action where a data field was required.
    #[error("key `{0}` is an action, not a data field")]
    NotAField(String),

    /// The key names a data field where an action was required.
    #[error("key `{0}` is a data field, not an action")]
    NotAnAction(String),

    /// A synchronous `call` was used on an asynchronous action.
    #[error("action `{0}` is asynchronous; use `call_async`")]
    AsyncAction(String),

    /// `call_async` was used on a synchronous action.
    #[error("action `{0}` is synchronous; use `call`")]
    SyncAction(String),

    /// A field value could not be downcast to the requested type.
    #[error("field `{key}` does not hold a `{requested}` (stored: `{stored}`)")]
    TypeMismatch {
        key: String,
        requested: &'static str,
        stored: &'static str,
    },
}

/// Convenience alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;
