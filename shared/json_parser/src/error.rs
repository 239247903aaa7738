//! Error types for JSON parsing and decoding.

use std::fmt;

/// Result type for JSON operations.
pub type Result<T> = std::result::Result<T, JsonError>;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonError {
    /// Input is empty or only whitespace.
    EmptyInput,
    /// Unexpected byte at the given offset.
    UnexpectedCharacter(char, usize),
    UnexpectedEndOfInput,
    InvalidNumber(String),
    InvalidEscapeSequence(String),
    UnterminatedString,
    /// Object key seen twice.
    DuplicateKey(String),
    /// Content after the top-level value.
    TrailingCharacters,
    /// Value has the wrong JSON type or does not fit the target type.
    TypeMismatch(String),
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonError::EmptyInput => write!(f, "Empty JSON input"),
            JsonError::UnexpectedCharacter(c, pos) => {
                write!(f, "Unexpected character '{}' at position {}", c, pos)
            }
            JsonError::UnexpectedEndOfInput => write!(f, "Unexpected end of input"),
            JsonError::InvalidNumber(s) => write!(f, "Invalid number: {}", s),
            JsonError::InvalidEscapeSequence(s) => write!(f, "Invalid escape sequence: {}", s),
            JsonError::UnterminatedString => write!(f, "Unterminated string"),
            JsonError::DuplicateKey(key) => write!(f, "Duplicate object key: {}", key),
            JsonError::TrailingCharacters => write!(f, "Trailing characters after JSON value"),
            JsonError::TypeMismatch(s) => write!(f, "Type mismatch: {}", s),
        }
    }
}

impl std::error::Error for JsonError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_display() {
        assert_eq!(JsonError::EmptyInput.to_string(), "Empty JSON input");
        assert_eq!(
            JsonError::UnexpectedCharacter('x', 5).to_string(),
            "Unexpected character 'x' at position 5"
        );
        assert_eq!(
            JsonError::TypeMismatch("expected u16".into()).to_string(),
            "Type mismatch: expected u16"
        );
    }
}
