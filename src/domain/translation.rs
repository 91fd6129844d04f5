use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language detected in the captured image. Exactly two are supported;
/// the model translates into the other one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Language {
    #[serde(rename = "ja")]
    Ja,
    #[serde(rename = "en")]
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ja" => Some(Language::Ja),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

/// Finalized translation: all fields present, produced only after the full
/// model response passed strict validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationResult {
    pub detected_language: Language,
    pub ja: String,
    pub en: String,
}

/// Best-effort view of an in-flight translation. Fields fill in as the
/// stream progresses; a populated field is never retracted, though its text
/// may still grow until finalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialTranslationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

/// A completed translation retained in history. Image data is never kept,
/// only the textual result and when it was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub result: TranslationResult,
    pub time: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(result: TranslationResult) -> Self {
        Self {
            result,
            time: Utc::now(),
        }
    }
}
