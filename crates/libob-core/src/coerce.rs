//! Conversion of inbound [`Value`]s into native parameter types.
//!
//! Every parameter type implements [`Coerce`]. The rules are strict about
//! shape: booleans are never integers, integers are never booleans, and a
//! number only changes kind when no information is lost.

use std::collections::{BTreeMap, HashMap};

use crate::error::CoerceError;
use crate::schema::{TypeDescriptor, TypeScope};
use crate::value::{Bytes, Value};

/// Largest integer magnitude an `f64` represents exactly.
const MAX_EXACT_FLOAT_INT: u64 = 1 << 53;

/// A type that inbound values can be coerced into.
pub trait Coerce: Sized {
    /// The declared type, as it appears in the handler's schema.
    fn descriptor() -> TypeDescriptor;

    /// Registers the record types this type refers to.
    fn register(_scope: &mut TypeScope) {}

    fn coerce(value: &Value) -> Result<Self, CoerceError>;

    /// Wire representation of a default value, if it has one.
    fn to_value(&self) -> Option<Value> {
        None
    }
}

fn mismatch<T: Coerce>(value: &Value) -> CoerceError {
    CoerceError::mismatch(T::descriptor().type_name(), value)
}

// ============================================================================
// Primitives
// ============================================================================

impl Coerce for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Any
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        Ok(value.clone())
    }

    fn to_value(&self) -> Option<Value> {
        Some(self.clone())
    }
}

impl Coerce for () {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Null
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Null)
    }
}

impl Coerce for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Bool
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Bool(*self))
    }
}

impl Coerce for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::String
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::String(self.clone()))
    }
}

/// Reads an integral value as `i128`, accepting floats with no fraction.
fn integral(value: &Value) -> Option<i128> {
    match value {
        Value::Int(i) => Some(*i as i128),
        Value::UInt(u) => Some(*u as i128),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(64) => {
            Some(*f as i128)
        }
        _ => None,
    }
}

macro_rules! impl_coerce_int {
    ($($ty:ty),*) => {
        $(impl Coerce for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Int
            }

            fn coerce(value: &Value) -> Result<Self, CoerceError> {
                let n = integral(value).ok_or_else(|| mismatch::<Self>(value))?;
                <$ty>::try_from(n).map_err(|_| {
                    CoerceError::invalid(format!(
                        "{n} is out of range for {}",
                        stringify!($ty)
                    ))
                })
            }

            fn to_value(&self) -> Option<Value> {
                Some(Value::from(*self))
            }
        })*
    };
}

impl_coerce_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Coerce for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Float
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT => Ok(*i as f64),
            Value::UInt(u) if *u <= MAX_EXACT_FLOAT_INT => Ok(*u as f64),
            Value::Int(_) | Value::UInt(_) => Err(CoerceError::invalid(
                "integer cannot be represented exactly as a float",
            )),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Float(*self))
    }
}

impl Coerce for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Float
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        let f = f64::coerce(value)?;
        if f.is_finite() && f.abs() > f32::MAX as f64 {
            return Err(CoerceError::invalid(format!("{f} is out of range for f32")));
        }
        Ok(f as f32)
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Float(*self as f64))
    }
}

impl Coerce for Bytes {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Bytes
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bytes(b) => Ok(Bytes(b.clone())),
            Value::String(s) => Bytes::from_base64(s)
                .map_err(|e| CoerceError::invalid(format!("invalid base64: {e}"))),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Bytes(self.0.clone()))
    }
}

// ============================================================================
// Composites
// ============================================================================

impl<T: Coerce> Coerce for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list(T::descriptor())
    }

    fn register(scope: &mut TypeScope) {
        T::register(scope);
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| T::coerce(item).map_err(|e| e.at_index(i)))
                .collect(),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn to_value(&self) -> Option<Value> {
        self.iter()
            .map(Coerce::to_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List)
    }
}

macro_rules! impl_coerce_map {
    ($($map:ident),*) => {
        $(impl<T: Coerce> Coerce for $map<String, T> {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::map(T::descriptor())
            }

            fn register(scope: &mut TypeScope) {
                T::register(scope);
            }

            fn coerce(value: &Value) -> Result<Self, CoerceError> {
                match value {
                    Value::Map(entries) => entries
                        .iter()
                        .map(|(k, v)| {
                            T::coerce(v).map(|v| (k.clone(), v)).map_err(|e| e.at_field(k))
                        })
                        .collect(),
                    other => Err(mismatch::<Self>(other)),
                }
            }

            fn to_value(&self) -> Option<Value> {
                self.iter()
                    .map(|(k, v)| v.to_value().map(|v| (k.clone(), v)))
                    .collect::<Option<_>>()
                    .map(Value::Map)
            }
        })*
    };
}

impl_coerce_map!(HashMap, BTreeMap);

impl<T: Coerce> Coerce for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }

    fn register(scope: &mut TypeScope) {
        T::register(scope);
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::coerce(other).map(Some),
        }
    }

    fn to_value(&self) -> Option<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Some(Value::Null),
        }
    }
}

impl<T: Coerce> Coerce for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn register(scope: &mut TypeScope) {
        T::register(scope);
    }

    fn coerce(value: &Value) -> Result<Self, CoerceError> {
        T::coerce(value).map(Box::new)
    }

    fn to_value(&self) -> Option<Value> {
        (**self).to_value()
    }
}

// ============================================================================
// Unions
// ============================================================================

/// Declares an enum that coerces as a union of its variants' types.
///
/// Variants are tried in declaration order; the first one whose type
/// accepts the value wins.
///
/// ```rust,ignore
/// coerce_union! {
///     #[derive(Debug)]
///     pub enum UserId {
///         Numeric(i64),
///         Named(String),
///     }
/// }
/// ```
#[macro_export]
macro_rules! coerce_union {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident($ty:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($ty)),+
        }

        impl $crate::Coerce for $name {
            fn descriptor() -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::Union(::std::vec![
                    $(<$ty as $crate::Coerce>::descriptor()),+
                ])
            }

            fn register(scope: &mut $crate::TypeScope) {
                $(<$ty as $crate::Coerce>::register(scope);)+
            }

            fn coerce(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::CoerceError> {
                $(
                    if let ::std::result::Result::Ok(v) = <$ty as $crate::Coerce>::coerce(value) {
                        return ::std::result::Result::Ok(Self::$variant(v));
                    }
                )+
                ::std::result::Result::Err($crate::CoerceError::mismatch(
                    <Self as $crate::Coerce>::descriptor().type_name(),
                    value,
                ))
            }

            fn to_value(&self) -> ::std::option::Option<$crate::Value> {
                match self {
                    $(Self::$variant(v) => $crate::Coerce::to_value(v)),+
                }
            }
        }
    };
}
