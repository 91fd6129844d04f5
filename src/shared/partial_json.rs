//! Lenient decoding of a JSON prefix.
//!
//! Streamed model output arrives in arbitrary chunks, so the accumulated text
//! is usually cut mid-object or mid-string. `decode_lenient` turns such a
//! prefix into a best-effort `serde_json::Value`: unterminated objects and
//! strings are closed at the end of input, while a value that cannot be
//! safely completed (a cut number, literal or array, or a cut object key) is
//! dropped together with its key. Truncation is never an error; only
//! genuinely malformed input (bad escapes, stray tokens, trailing garbage)
//! is reported as `DecodeError`.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub position: usize,
    pub message: String,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed JSON at byte {}: {}", self.position, self.message)
    }
}

impl std::error::Error for DecodeError {}

/// `Ok(Some(value))` for a decodable prefix, `Ok(None)` when the input is not
/// yet parseable (empty, or cut at a point where nothing can be kept).
pub fn decode_lenient(input: &str) -> Result<Option<Value>, DecodeError> {
    let mut decoder = Decoder { input, pos: 0 };
    decoder.skip_ws();
    if decoder.at_end() {
        return Ok(None);
    }
    match decoder.value()? {
        Part::Complete(value) => {
            decoder.skip_ws();
            if decoder.at_end() {
                Ok(Some(value))
            } else {
                Err(decoder.error("trailing characters after value"))
            }
        }
        Part::Truncated(value) => Ok(Some(value)),
        Part::Unusable => Ok(None),
    }
}

/// How far a sub-value got before the input ran out.
enum Part {
    /// Properly terminated.
    Complete(Value),
    /// Cut off, but the prefix is safe to keep (strings, objects).
    Truncated(Value),
    /// Cut off and the prefix cannot be trusted (numbers, literals, arrays).
    Unusable,
}

enum Str {
    Complete(String),
    Truncated(String),
}

struct Decoder<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn value(&mut self) -> Result<Part, DecodeError> {
        match self.peek() {
            None => Ok(Part::Unusable),
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some('"') => Ok(match self.string()? {
                Str::Complete(s) => Part::Complete(Value::String(s)),
                Str::Truncated(s) => Part::Truncated(Value::String(s)),
            }),
            Some('t') => self.literal("true", Value::Bool(true)),
            Some('f') => self.literal("false", Value::Bool(false)),
            Some('n') => self.literal("null", Value::Null),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) => Err(self.error(format!("unexpected character {:?}", c))),
        }
    }

    fn object(&mut self) -> Result<Part, DecodeError> {
        self.bump();
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.bump();
            return Ok(Part::Complete(Value::Object(map)));
        }
        loop {
            self.skip_ws();
            let key = match self.peek() {
                None => return Ok(Part::Truncated(Value::Object(map))),
                Some('"') => match self.string()? {
                    Str::Complete(key) => key,
                    // A half-received key names nothing we can keep.
                    Str::Truncated(_) => return Ok(Part::Truncated(Value::Object(map))),
                },
                Some(c) => return Err(self.error(format!("expected object key, got {:?}", c))),
            };
            self.skip_ws();
            match self.peek() {
                None => return Ok(Part::Truncated(Value::Object(map))),
                Some(':') => {
                    self.bump();
                }
                Some(c) => return Err(self.error(format!("expected ':', got {:?}", c))),
            }
            self.skip_ws();
            match self.value()? {
                Part::Complete(value) => {
                    map.insert(key, value);
                }
                Part::Truncated(value) => {
                    map.insert(key, value);
                    return Ok(Part::Truncated(Value::Object(map)));
                }
                Part::Unusable => return Ok(Part::Truncated(Value::Object(map))),
            }
            self.skip_ws();
            match self.peek() {
                None => return Ok(Part::Truncated(Value::Object(map))),
                Some(',') => {
                    self.bump();
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        return Err(self.error("expected object key after ','"));
                    }
                }
                Some('}') => {
                    self.bump();
                    return Ok(Part::Complete(Value::Object(map)));
                }
                Some(c) => return Err(self.error(format!("expected ',' or '}}', got {:?}", c))),
            }
        }
    }

    // Arrays get no leniency: a cut array yields nothing.
    fn array(&mut self) -> Result<Part, DecodeError> {
        self.bump();
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(Part::Complete(Value::Array(items)));
        }
        loop {
            self.skip_ws();
            match self.value()? {
                Part::Complete(value) => items.push(value),
                Part::Truncated(_) | Part::Unusable => return Ok(Part::Unusable),
            }
            self.skip_ws();
            match self.peek() {
                None => return Ok(Part::Unusable),
                Some(',') => {
                    self.bump();
                    self.skip_ws();
                    if self.peek() == Some(']') {
                        return Err(self.error("expected value after ','"));
                    }
                }
                Some(']') => {
                    self.bump();
                    return Ok(Part::Complete(Value::Array(items)));
                }
                Some(c) => return Err(self.error(format!("expected ',' or ']', got {:?}", c))),
            }
        }
    }

    fn string(&mut self) -> Result<Str, DecodeError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Ok(Str::Truncated(out)),
                Some('"') => return Ok(Str::Complete(out)),
                Some('\\') => match self.bump() {
                    // Escape cut at end of input: keep what came before it.
                    None => return Ok(Str::Truncated(out)),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('/') => out.push('/'),
                    Some('b') => out.push('\u{0008}'),
                    Some('f') => out.push('\u{000C}'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('u') => match self.unicode_escape(&mut out)? {
                        true => {}
                        false => return Ok(Str::Truncated(out)),
                    },
                    Some(c) => {
                        return Err(self.error(format!("invalid escape character {:?}", c)))
                    }
                },
                Some(c) if (c as u32) < 0x20 => {
                    return Err(self.error("unescaped control character in string"))
                }
                Some(c) => out.push(c),
            }
        }
    }

    /// Decodes the hex digits of a `\u` escape, combining surrogate pairs.
    /// Returns `false` when the input ended mid-escape (the partial escape is
    /// dropped from `out`).
    fn unicode_escape(&mut self, out: &mut String) -> Result<bool, DecodeError> {
        let first = match self.hex4()? {
            Some(code) => code,
            None => return Ok(false),
        };
        if !(0xD800..0xDC00).contains(&first) {
            match char::from_u32(first) {
                Some(c) => out.push(c),
                None => out.push('\u{FFFD}'),
            }
            return Ok(true);
        }
        // High surrogate: a low surrogate escape must follow to complete it.
        if !self.input[self.pos..].starts_with("\\u") {
            if self.at_end() {
                return Ok(false);
            }
            out.push('\u{FFFD}');
            return Ok(true);
        }
        self.pos += 2;
        let second = match self.hex4()? {
            Some(code) => code,
            None => return Ok(false),
        };
        if (0xDC00..0xE000).contains(&second) {
            let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
            match char::from_u32(combined) {
                Some(c) => out.push(c),
                None => out.push('\u{FFFD}'),
            }
        } else {
            out.push('\u{FFFD}');
            match char::from_u32(second) {
                Some(c) => out.push(c),
                None => out.push('\u{FFFD}'),
            }
        }
        Ok(true)
    }

    fn hex4(&mut self) -> Result<Option<u32>, DecodeError> {
        let mut code = 0u32;
        for _ in 0..4 {
            match self.bump() {
                None => return Ok(None),
                Some(c) => match c.to_digit(16) {
                    Some(d) => code = code * 16 + d,
                    None => return Err(self.error(format!("invalid hex digit {:?}", c))),
                },
            }
        }
        Ok(Some(code))
    }

    fn literal(&mut self, word: &str, value: Value) -> Result<Part, DecodeError> {
        for expected in word.chars() {
            match self.bump() {
                None => return Ok(Part::Unusable),
                Some(c) if c == expected => {}
                Some(c) => return Err(self.error(format!("unexpected character {:?}", c))),
            }
        }
        Ok(Part::Complete(value))
    }

    // A number at end of input might still be extended by the next fragment,
    // so it only counts once a delimiter follows it.
    fn number(&mut self) -> Result<Part, DecodeError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        if !self.digits() {
            return if self.at_end() {
                Ok(Part::Unusable)
            } else {
                Err(self.error("expected digit"))
            };
        }
        if self.peek() == Some('.') {
            self.bump();
            if !self.digits() {
                return if self.at_end() {
                    Ok(Part::Unusable)
                } else {
                    Err(self.error("expected digit after '.'"))
                };
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if !self.digits() {
                return if self.at_end() {
                    Ok(Part::Unusable)
                } else {
                    Err(self.error("expected digit in exponent"))
                };
            }
        }
        if self.at_end() {
            return Ok(Part::Unusable);
        }
        match serde_json::from_str::<serde_json::Number>(&self.input[start..self.pos]) {
            Ok(number) => Ok(Part::Complete(Value::Number(number))),
            Err(_) => Err(self.error("invalid number")),
        }
    }

    fn digits(&mut self) -> bool {
        let mut any = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            any = true;
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_object() {
        let value = decode_lenient(r#"{"detected_language":"ja","ja":"犬","en":"dog"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            json!({"detected_language":"ja","ja":"犬","en":"dog"})
        );
    }

    #[test]
    fn test_empty_input_not_parseable() {
        assert_eq!(decode_lenient("").unwrap(), None);
        assert_eq!(decode_lenient("  \n").unwrap(), None);
    }

    #[test]
    fn test_unterminated_object() {
        let value = decode_lenient(r#"{"ja":"犬""#).unwrap().unwrap();
        assert_eq!(value, json!({"ja":"犬"}));
    }

    #[test]
    fn test_unterminated_string_kept_as_prefix() {
        let value = decode_lenient(r#"{"ja":"こん"#).unwrap().unwrap();
        assert_eq!(value, json!({"ja":"こん"}));
    }

    #[test]
    fn test_cut_key_dropped() {
        let value = decode_lenient(r#"{"ja":"犬","e"#).unwrap().unwrap();
        assert_eq!(value, json!({"ja":"犬"}));
    }

    #[test]
    fn test_key_without_value_dropped() {
        let value = decode_lenient(r#"{"ja":"犬","en":"#).unwrap().unwrap();
        assert_eq!(value, json!({"ja":"犬"}));
    }

    #[test]
    fn test_cut_number_dropped() {
        let value = decode_lenient(r#"{"a":1,"b":22"#).unwrap().unwrap();
        assert_eq!(value, json!({"a":1}));
    }

    #[test]
    fn test_cut_literal_dropped() {
        let value = decode_lenient(r#"{"a":"x","b":tru"#).unwrap().unwrap();
        assert_eq!(value, json!({"a":"x"}));
    }

    #[test]
    fn test_cut_array_dropped() {
        let value = decode_lenient(r#"{"a":"x","b":[1,2"#).unwrap().unwrap();
        assert_eq!(value, json!({"a":"x"}));
    }

    #[test]
    fn test_nested_object_kept_partial() {
        let value = decode_lenient(r#"{"outer":{"inner":"va"#).unwrap().unwrap();
        assert_eq!(value, json!({"outer":{"inner":"va"}}));
    }

    #[test]
    fn test_cut_escape_dropped_from_string() {
        let value = decode_lenient(r#"{"ja":"ab\"#).unwrap().unwrap();
        assert_eq!(value, json!({"ja":"ab"}));
        let value = decode_lenient(r#"{"ja":"ab\u30"#).unwrap().unwrap();
        assert_eq!(value, json!({"ja":"ab"}));
    }

    #[test]
    fn test_complete_escapes() {
        let value = decode_lenient(r#"{"a":"line\nbreak é 😀"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(value, json!({"a":"line\nbreak é 😀"}));
    }

    #[test]
    fn test_invalid_escape_is_malformed() {
        assert!(decode_lenient(r#"{"a":"bad\x"}"#).is_err());
    }

    #[test]
    fn test_invalid_hex_is_malformed() {
        assert!(decode_lenient(r#"{"a":"bad\uZZ11"}"#).is_err());
    }

    #[test]
    fn test_stray_token_is_malformed() {
        assert!(decode_lenient(r#"{"a": @}"#).is_err());
        assert!(decode_lenient("not json").is_err());
    }

    #[test]
    fn test_trailing_garbage_is_malformed() {
        assert!(decode_lenient(r#"{"a":"x"} extra"#).is_err());
    }

    #[test]
    fn test_trailing_comma_is_malformed() {
        assert!(decode_lenient(r#"{"a":"x",}"#).is_err());
    }

    // Every prefix of a valid payload decodes to a subset whose populated
    // fields match the full value exactly, or to "not yet parseable".
    #[test]
    fn test_every_prefix_is_consistent() {
        let full_text = r#"{"detected_language":"ja","ja":"こんにちは","en":"Hello"}"#;
        let full: Value = serde_json::from_str(full_text).unwrap();
        for end in 0..=full_text.len() {
            if !full_text.is_char_boundary(end) {
                continue;
            }
            match decode_lenient(&full_text[..end]).unwrap() {
                None => {}
                Some(Value::Object(map)) => {
                    for (key, value) in &map {
                        let expected = full.get(key).unwrap().as_str().unwrap();
                        let got = value.as_str().unwrap();
                        assert!(
                            expected.starts_with(got),
                            "key {:?}: {:?} is not a prefix of {:?}",
                            key,
                            got,
                            expected
                        );
                    }
                }
                Some(other) => panic!("unexpected decode of prefix {}: {:?}", end, other),
            }
        }
    }
}
