use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Object-safe view over a field payload: downcasting plus value equality.
trait FieldValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_value(&self, other: &dyn FieldValue) -> bool;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + PartialEq> FieldValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_value(&self, other: &dyn FieldValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A type-erased, cheaply clonable field payload.
///
/// Cloning a `Value` clones the handle, not the payload. Two values are
/// considered unchanged by the diff when they are the same allocation or
/// when their payloads compare equal, the equivalent of `Object.is` over
/// a mix of primitives and shared objects.
///
/// # Examples
///
/// ```
/// use keywise::Value;
///
/// let a = Value::new(5i32);
/// let b = a.clone();
/// assert!(a.same(&b));
/// assert_eq!(a.downcast_ref::<i32>(), Some(&5));
/// ```
#[derive(Clone)]
pub struct Value(Arc<dyn FieldValue>);

impl Value {
    /// Wrap a payload. Any `Send + Sync + PartialEq` type qualifies.
    pub fn new<T>(payload: T) -> Self
    where
        T: Any + Send + Sync + PartialEq,
    {
        Value(Arc::new(payload))
    }

    /// Borrow the payload as `T`, if that is what it holds.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Name of the payload's concrete type (for diagnostics).
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Identity-or-equality comparison used by the change diff.
    pub fn same(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.eq_value(other.0.as_ref())
    }
}

/// Clone a payload out of a handle, or report what the field really holds.
pub(crate) fn downcast_cloned<T: Any + Clone>(key: &str, value: &Value) -> crate::StoreResult<T> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| crate::StoreError::TypeMismatch {
            key: key.to_string(),
            requested: std::any::type_name::<T>(),
            stored: value.type_name(),
        })
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.type_name()).finish()
    }
}
