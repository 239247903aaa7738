//! Macros that derive [`Deserialize`](crate::Deserialize).

/// Implements `Deserialize` for a struct with named fields.
///
/// Fields missing from the JSON object keep the value from `Default`, so
/// config files only need to list what they override. Unknown keys are
/// rejected to catch typos.
///
/// ```
/// use json_parser::{from_str, impl_json};
///
/// #[derive(Debug)]
/// struct Limits {
///     pathmtu: u32,
///     nodelay: bool,
/// }
///
/// impl Default for Limits {
///     fn default() -> Self {
///         Limits { pathmtu: 1500, nodelay: false }
///     }
/// }
///
/// impl_json! {
///     Limits {
///         pathmtu: u32,
///         nodelay: bool,
///     }
/// }
///
/// let limits: Limits = from_str(r#"{"nodelay": true}"#).unwrap();
/// assert_eq!(limits.pathmtu, 1500);
/// assert!(limits.nodelay);
/// assert!(from_str::<Limits>(r#"{"path_mtu": 9000}"#).is_err());
/// ```
#[macro_export]
macro_rules! impl_json {
    ($struct_name:ident { $($field:ident: $field_ty:ty),* $(,)? }) => {
        impl $crate::Deserialize for $struct_name {
            fn deserialize(
                value: &$crate::JsonValue,
            ) -> ::core::result::Result<Self, $crate::JsonError> {
                let obj = value.as_object().ok_or_else(|| {
                    $crate::JsonError::TypeMismatch(format!(
                        "expected object for {}",
                        stringify!($struct_name)
                    ))
                })?;

                const FIELDS: &[&str] = &[$(stringify!($field)),*];
                if let Some(unknown) = obj.keys().find(|k| !FIELDS.contains(&k.as_str())) {
                    return Err($crate::JsonError::TypeMismatch(format!(
                        "unknown field '{}' in {}",
                        unknown,
                        stringify!($struct_name)
                    )));
                }

                let mut result = Self::default();
                $(
                    if let Some(field_value) = obj.get(stringify!($field)) {
                        result.$field = <$field_ty as $crate::Deserialize>::deserialize(field_value)
                            .map_err(|e| $crate::JsonError::TypeMismatch(format!(
                                "{}.{}: {}",
                                stringify!($struct_name),
                                stringify!($field),
                                e
                            )))?;
                    }
                )*
                Ok(result)
            }
        }
    };
}

/// Implements `Deserialize` for a unit-variant enum from a JSON string.
/// Matching is exact on the variant name.
#[macro_export]
macro_rules! impl_json_enum {
    ($enum_name:ident { $($variant:ident),* $(,)? }) => {
        impl $crate::Deserialize for $enum_name {
            fn deserialize(
                value: &$crate::JsonValue,
            ) -> ::core::result::Result<Self, $crate::JsonError> {
                let s = value.as_string().ok_or_else(|| {
                    $crate::JsonError::TypeMismatch(format!(
                        "expected string for enum {}",
                        stringify!($enum_name)
                    ))
                })?;
                match s {
                    $(stringify!($variant) => Ok($enum_name::$variant),)*
                    _ => Err($crate::JsonError::TypeMismatch(format!(
                        "unknown variant '{}' for enum {}",
                        s,
                        stringify!($enum_name)
                    ))),
                }
            }
        }
    };
}
