//! Parsed JSON tree.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Object(HashMap<String, JsonValue>),
    Array(Vec<JsonValue>),
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl JsonValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsonValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    pub fn as_object(&self) -> Option<&HashMap<String, JsonValue>> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a dotted path such as `"output.auth_hmac"`.
    ///
    /// ```
    /// use json_parser::parse_json;
    ///
    /// let json = parse_json(r#"{"output":{"nodelay":true}}"#).unwrap();
    /// assert_eq!(json.get_path("output.nodelay").and_then(|v| v.as_bool()), Some(true));
    /// ```
    pub fn get_path(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(self, |node, key| node.as_object()?.get(key))
    }

    /// Short type name used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            JsonValue::Object(_) => "object",
            JsonValue::Array(_) => "array",
            JsonValue::String(_) => "string",
            JsonValue::Number(_) => "number",
            JsonValue::Bool(_) => "bool",
            JsonValue::Null => "null",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_path_nested() {
        let mut inner = HashMap::new();
        inner.insert("mtu".to_string(), JsonValue::Number(1280.0));
        let mut outer = HashMap::new();
        outer.insert("output".to_string(), JsonValue::Object(inner));
        let value = JsonValue::Object(outer);

        assert_eq!(
            value.get_path("output.mtu").and_then(JsonValue::as_number),
            Some(1280.0)
        );
        assert!(value.get_path("output.missing").is_none());
        assert!(value.get_path("output.mtu.deeper").is_none());
    }

    #[test]
    fn test_kind() {
        assert_eq!(JsonValue::Null.kind(), "null");
        assert_eq!(JsonValue::Array(vec![]).kind(), "array");
    }
}
