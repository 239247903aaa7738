//! Decoding parsed JSON into Rust types.

use crate::error::JsonError;
use crate::value::JsonValue;
use std::collections::HashMap;

/// Types that can be built from a [`JsonValue`].
pub trait Deserialize: Sized {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError>;
}

fn mismatch(expected: &str, value: &JsonValue) -> JsonError {
    JsonError::TypeMismatch(format!("expected {}, found {}", expected, value.kind()))
}

impl Deserialize for String {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
        value
            .as_string()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl Deserialize for bool {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl Deserialize for f64 {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
        value.as_number().ok_or_else(|| mismatch("number", value))
    }
}

/// Integers must be whole and within the target range; `1500.5` or `-1`
/// for a `u16` are rejected instead of being truncated.
macro_rules! impl_deserialize_int {
    ($($ty:ty),*) => {
        $(
            impl Deserialize for $ty {
                fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
                    let num = value
                        .as_number()
                        .ok_or_else(|| mismatch(stringify!($ty), value))?;
                    if num.fract() != 0.0 || num < <$ty>::MIN as f64 || num > <$ty>::MAX as f64 {
                        return Err(JsonError::TypeMismatch(format!(
                            "{} does not fit in {}",
                            num,
                            stringify!($ty)
                        )));
                    }
                    Ok(num as $ty)
                }
            }
        )*
    };
}

impl_deserialize_int!(u8, u16, u32, u64, usize, i32, i64);

impl<T: Deserialize> Deserialize for Vec<T> {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
        value
            .as_array()
            .ok_or_else(|| mismatch("array", value))?
            .iter()
            .map(T::deserialize)
            .collect()
    }
}

impl<T: Deserialize> Deserialize for Option<T> {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::deserialize(value).map(Some)
        }
    }
}

impl<V: Deserialize> Deserialize for HashMap<String, V> {
    fn deserialize(value: &JsonValue) -> Result<Self, JsonError> {
        value
            .as_object()
            .ok_or_else(|| mismatch("object", value))?
            .iter()
            .map(|(k, v)| Ok((k.clone(), V::deserialize(v)?)))
            .collect()
    }
}

/// Parses `s` and decodes it as `T`.
pub fn from_str<T: Deserialize>(s: &str) -> Result<T, JsonError> {
    let value = crate::parse_json(s)?;
    T::deserialize(&value)
}
