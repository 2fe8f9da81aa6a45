//! Leaf values: Rust types that occupy a single schema position.

use bytes::Bytes;
use structfs_fieldset::Value;

use crate::schema::ValueType;

/// A type stored as one `Value` in a field set.
///
/// `from_value` takes the value by move; implementations must not clone the
/// payload when the representation can be reused (strings, byte buffers,
/// arrays all move straight through).
///
/// `from_value` only ever sees values admitted by `value_type()`, so `None`
/// means "right shape, wrong range" (a `300` for a `u8`, say).
pub trait Leaf: Sized {
    /// The value type this leaf declares in a schema.
    fn value_type() -> ValueType;

    fn from_value(value: Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

impl Leaf for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! integer_leaf {
    ($($ty:ty),*) => {
        $(
            impl Leaf for $ty {
                fn value_type() -> ValueType {
                    ValueType::Integer
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Integer(i) => <$ty>::try_from(i).ok(),
                        _ => None,
                    }
                }

                fn into_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }
            }
        )*
    };
}

// u64/usize are left out: not every value fits the i64 the field set stores.
integer_leaf!(i8, i16, i32, i64, u8, u16, u32);

impl Leaf for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl Leaf for f32 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    /// Rejects values that do not survive the trip through `f32`.
    fn from_value(value: Value) -> Option<Self> {
        let wide = f64::from_value(value)?;
        let narrow = wide as f32;
        (f64::from(narrow) == wide || wide.is_nan()).then_some(narrow)
    }

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl Leaf for String {
    fn value_type() -> ValueType {
        ValueType::String
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl Leaf for Bytes {
    fn value_type() -> ValueType {
        ValueType::Bytes
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(Bytes::from(b)),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bytes(Vec::from(self))
    }
}

/// Untyped sub-tree, passed through unchanged.
impl Leaf for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl<T: Leaf> Leaf for Option<T> {
    fn value_type() -> ValueType {
        ValueType::Optional(Box::new(T::value_type()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: Leaf> Leaf for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::Array(Box::new(T::value_type()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(Leaf::into_value).collect())
    }
}

impl<T: Leaf> Leaf for Box<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn from_value(value: Value) -> Option<Self> {
        T::from_value(value).map(Box::new)
    }

    fn into_value(self) -> Value {
        (*self).into_value()
    }
}
