//! Validation of decoded model output against the translation schema.
//!
//! Two modes: `validate_partial` accepts any subset of the fields (present
//! fields must still match their type/enum), `validate_full` requires all
//! three. Neither mutates its input; both report every problem found.

use serde_json::Value;

use crate::domain::translation::{Language, PartialTranslationResult, TranslationResult};

pub const KEY_DETECTED_LANGUAGE: &str = "detected_language";
pub const KEY_JA: &str = "ja";
pub const KEY_EN: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub key: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Validates a possibly incomplete decode. Unknown keys are ignored, as the
/// model occasionally pads its object before settling on the schema.
pub fn validate_partial(value: &Value) -> Result<PartialTranslationResult, Vec<ValidationIssue>> {
    let map = match value.as_object() {
        Some(map) => map,
        None => {
            return Err(vec![ValidationIssue::new(
                KEY_DETECTED_LANGUAGE,
                "expected a JSON object",
            )])
        }
    };

    let mut issues = Vec::new();

    let detected_language = match map.get(KEY_DETECTED_LANGUAGE) {
        None => None,
        Some(v) => match language_of(v) {
            Ok(lang) => Some(lang),
            Err(issue) => {
                issues.push(issue);
                None
            }
        },
    };
    let ja = string_field(map, KEY_JA, &mut issues);
    let en = string_field(map, KEY_EN, &mut issues);

    if issues.is_empty() {
        Ok(PartialTranslationResult {
            detected_language,
            ja,
            en,
        })
    } else {
        Err(issues)
    }
}

/// Validates a completed response: all three keys required,
/// `detected_language` one of `ja`/`en`.
pub fn validate_full(value: &Value) -> Result<TranslationResult, Vec<ValidationIssue>> {
    let map = match value.as_object() {
        Some(map) => map,
        None => {
            return Err(vec![ValidationIssue::new(
                KEY_DETECTED_LANGUAGE,
                "expected a JSON object",
            )])
        }
    };

    let mut issues = Vec::new();

    let detected_language = match map.get(KEY_DETECTED_LANGUAGE) {
        None => {
            issues.push(ValidationIssue::new(KEY_DETECTED_LANGUAGE, "missing"));
            None
        }
        Some(v) => match language_of(v) {
            Ok(lang) => Some(lang),
            Err(issue) => {
                issues.push(issue);
                None
            }
        },
    };
    let ja = required_string(map, KEY_JA, &mut issues);
    let en = required_string(map, KEY_EN, &mut issues);

    match (detected_language, ja, en) {
        (Some(detected_language), Some(ja), Some(en)) if issues.is_empty() => {
            Ok(TranslationResult {
                detected_language,
                ja,
                en,
            })
        }
        _ => Err(issues),
    }
}

fn language_of(value: &Value) -> Result<Language, ValidationIssue> {
    let s = value.as_str().ok_or_else(|| {
        ValidationIssue::new(KEY_DETECTED_LANGUAGE, "expected a string")
    })?;
    Language::parse(s).ok_or_else(|| {
        ValidationIssue::new(
            KEY_DETECTED_LANGUAGE,
            format!("expected \"ja\" or \"en\", got {:?}", s),
        )
    })
}

fn string_field(
    map: &serde_json::Map<String, Value>,
    key: &'static str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match map.get(key) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(ValidationIssue::new(key, "expected a string"));
            None
        }
    }
}

fn required_string(
    map: &serde_json::Map<String, Value>,
    key: &'static str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match map.get(key) {
        None => {
            issues.push(ValidationIssue::new(key, "missing"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(ValidationIssue::new(key, "expected a string"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_round_trip() {
        let value = json!({"detected_language": "ja", "ja": "犬", "en": "dog"});
        let result = validate_full(&value).unwrap();
        assert_eq!(result.detected_language, Language::Ja);
        assert_eq!(serde_json::to_value(&result).unwrap(), value);
    }

    #[test]
    fn test_full_rejects_unknown_language() {
        let value = json!({"detected_language": "fr", "ja": "x", "en": "y"});
        let issues = validate_full(&value).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, KEY_DETECTED_LANGUAGE);
    }

    #[test]
    fn test_full_reports_every_missing_key() {
        let issues = validate_full(&json!({})).unwrap_err();
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_full_rejects_non_object() {
        assert!(validate_full(&json!("just text")).is_err());
    }

    #[test]
    fn test_partial_accepts_empty_object() {
        let partial = validate_partial(&json!({})).unwrap();
        assert_eq!(partial, PartialTranslationResult::default());
    }

    #[test]
    fn test_partial_accepts_subset() {
        let partial = validate_partial(&json!({"detected_language": "ja", "ja": "こん"})).unwrap();
        assert_eq!(partial.detected_language, Some(Language::Ja));
        assert_eq!(partial.ja.as_deref(), Some("こん"));
        assert_eq!(partial.en, None);
    }

    #[test]
    fn test_partial_rejects_wrong_type() {
        let issues = validate_partial(&json!({"ja": 3})).unwrap_err();
        assert_eq!(issues[0].key, KEY_JA);
    }

    #[test]
    fn test_partial_rejects_truncated_language_value() {
        // "j" is a legitimate string prefix but not a member of the enum.
        assert!(validate_partial(&json!({"detected_language": "j"})).is_err());
    }

    #[test]
    fn test_partial_ignores_unknown_keys() {
        let partial = validate_partial(&json!({"note": "extra", "en": "hi"})).unwrap();
        assert_eq!(partial.en.as_deref(), Some("hi"));
    }
}
