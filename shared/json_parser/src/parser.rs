//! Recursive-descent JSON parser over the input bytes.

use crate::error::{JsonError, Result};
use crate::value::JsonValue;
use std::collections::HashMap;

/// Parses a complete JSON document.
///
/// # Examples
///
/// ```
/// use json_parser::parse_json;
///
/// let json = parse_json(r#"{"pathmtu": 1500, "nodelay": false}"#).unwrap();
/// assert_eq!(json.get_path("pathmtu").and_then(|v| v.as_number()), Some(1500.0));
/// ```
pub fn parse_json(input: &str) -> Result<JsonValue> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(JsonError::EmptyInput);
    }
    let value = parser.value()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(JsonError::TrailingCharacters);
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Result<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(JsonError::UnexpectedEndOfInput)
    }

    fn bump(&mut self) -> Result<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn unexpected(&self, byte: u8) -> JsonError {
        JsonError::UnexpectedCharacter(byte as char, self.pos)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let byte = self.peek()?;
        if byte != expected {
            return Err(self.unexpected(byte));
        }
        self.pos += 1;
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.bytes.get(self.pos) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<JsonValue> {
        self.skip_whitespace();
        match self.peek()? {
            b'{' => self.object(),
            b'[' => self.array(),
            b'"' => Ok(JsonValue::String(self.string()?)),
            b't' => self.literal("true", JsonValue::Bool(true)),
            b'f' => self.literal("false", JsonValue::Bool(false)),
            b'n' => self.literal("null", JsonValue::Null),
            b'-' | b'0'..=b'9' => self.number(),
            other => Err(self.unexpected(other)),
        }
    }

    fn literal(&mut self, word: &str, value: JsonValue) -> Result<JsonValue> {
        for &expected in word.as_bytes() {
            self.expect(expected)?;
        }
        Ok(value)
    }

    fn object(&mut self) -> Result<JsonValue> {
        self.expect(b'{')?;
        let mut map = HashMap::new();
        self.skip_whitespace();
        if self.peek()? == b'}' {
            self.pos += 1;
            return Ok(JsonValue::Object(map));
        }
        loop {
            self.skip_whitespace();
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            let value = self.value()?;
            if map.contains_key(&key) {
                return Err(JsonError::DuplicateKey(key));
            }
            map.insert(key, value);

            self.skip_whitespace();
            match self.bump()? {
                b',' => continue,
                b'}' => return Ok(JsonValue::Object(map)),
                other => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
        }
    }

    fn array(&mut self) -> Result<JsonValue> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek()? == b']' {
            self.pos += 1;
            return Ok(JsonValue::Array(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump()? {
                b',' => continue,
                b']' => return Ok(JsonValue::Array(items)),
                other => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
        }
    }

    fn string(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            let start = self.pos;
            while let Some(&byte) = self.bytes.get(self.pos) {
                if byte == b'"' || byte == b'\\' {
                    break;
                }
                self.pos += 1;
            }
            // Input is a &str and we only split on ASCII, so this is valid UTF-8.
            out.push_str(&String::from_utf8_lossy(&self.bytes[start..self.pos]));

            match self.bytes.get(self.pos) {
                None => return Err(JsonError::UnterminatedString),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(_) => {
                    self.pos += 1;
                    self.escape(&mut out)?;
                }
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        let byte = self.bump().map_err(|_| JsonError::UnterminatedString)?;
        let ch = match byte {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{08}',
            b'f' => '\u{0C}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.unicode_escape()?,
            other => {
                return Err(JsonError::InvalidEscapeSequence(format!(
                    "\\{}",
                    other as char
                )));
            }
        };
        out.push(ch);
        Ok(())
    }

    fn unicode_escape(&mut self) -> Result<char> {
        let high = self.hex4()?;
        let code = if (0xD800..0xDC00).contains(&high) {
            // Surrogate pair: a second \uXXXX must follow.
            self.expect(b'\\')?;
            self.expect(b'u')?;
            let low = self.hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(JsonError::InvalidEscapeSequence(format!("\\u{:04X}", low)));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code)
            .ok_or_else(|| JsonError::InvalidEscapeSequence(format!("\\u{:04X}", code)))
    }

    fn hex4(&mut self) -> Result<u32> {
        let mut code = 0u32;
        for _ in 0..4 {
            let byte = self.bump()?;
            let digit = (byte as char)
                .to_digit(16)
                .ok_or_else(|| JsonError::InvalidEscapeSequence(format!("\\u..{}", byte as char)))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn number(&mut self) -> Result<JsonValue> {
        let start = self.pos;
        if self.peek()? == b'-' {
            self.pos += 1;
        }
        match self.bytes.get(self.pos) {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.digits(),
            _ => return Err(JsonError::InvalidNumber("expected digit".to_string())),
        }
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            self.required_digits("fraction")?;
        }
        if let Some(b'e' | b'E') = self.bytes.get(self.pos) {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.bytes.get(self.pos) {
                self.pos += 1;
            }
            self.required_digits("exponent")?;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| JsonError::InvalidNumber("non-ascii".to_string()))?;
        text.parse::<f64>()
            .map(JsonValue::Number)
            .map_err(|_| JsonError::InvalidNumber(text.to_string()))
    }

    fn digits(&mut self) {
        while let Some(b'0'..=b'9') = self.bytes.get(self.pos) {
            self.pos += 1;
        }
    }

    fn required_digits(&mut self, part: &str) -> Result<()> {
        let before = self.pos;
        self.digits();
        if self.pos == before {
            return Err(JsonError::InvalidNumber(format!("expected digit in {}", part)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let value = parse_json(r#"{"auth_hmac": "sha256", "rwnd": 65536}"#).unwrap();
        assert_eq!(
            value.get_path("auth_hmac").and_then(|v| v.as_string()),
            Some("sha256")
        );
        assert_eq!(
            value.get_path("rwnd").and_then(|v| v.as_number()),
            Some(65536.0)
        );
    }

    #[test]
    fn test_parse_array_of_strings() {
        let value = parse_json(r#"["DATA", "SACK"]"#).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_string(), Some("SACK"));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_json("-0.5e1").unwrap(), JsonValue::Number(-5.0));
        assert_eq!(parse_json("0").unwrap(), JsonValue::Number(0.0));
        assert!(parse_json("01").is_err());
        assert!(parse_json("1.").is_err());
        assert!(parse_json("-").is_err());
    }

    #[test]
    fn test_parse_escapes() {
        let value = parse_json(r#""a\tbé😀""#).unwrap();
        assert_eq!(value.as_string(), Some("a\tb\u{e9}\u{1F600}"));
        let value = parse_json(r#""\u00e9\ud83d\ude00""#).unwrap();
        assert_eq!(value.as_string(), Some("\u{e9}\u{1F600}"));
        assert!(parse_json(r#""\ud83dA""#).is_err());
        assert!(parse_json(r#""\q""#).is_err());
    }

    #[test]
    fn test_parse_utf8_passthrough() {
        let value = parse_json("\"sécret\"").unwrap();
        assert_eq!(value.as_string(), Some("sécret"));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_json(" true ").unwrap(), JsonValue::Bool(true));
        assert!(parse_json("null").unwrap().is_null());
        assert!(parse_json("nul").is_err());
    }

    #[test]
    fn test_invalid_documents() {
        assert_eq!(parse_json("   "), Err(JsonError::EmptyInput));
        assert_eq!(parse_json("{"), Err(JsonError::UnexpectedEndOfInput));
        assert_eq!(parse_json(r#""open"#), Err(JsonError::UnterminatedString));
        assert_eq!(parse_json("{} x"), Err(JsonError::TrailingCharacters));
        assert!(matches!(
            parse_json(r#"{"a": 1 "b": 2}"#),
            Err(JsonError::UnexpectedCharacter('"', _))
        ));
    }

    #[test]
    fn test_duplicate_keys() {
        assert_eq!(
            parse_json(r#"{"k": 1, "k": 2}"#),
            Err(JsonError::DuplicateKey("k".to_string()))
        );
    }
}
