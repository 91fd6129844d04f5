use serde::{Deserialize, Serialize};
use validator::Validate;

/// Models the Gemini backend is known to accept for image transcription.
pub const KNOWN_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-8b",
    "gemini-1.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite-preview-02-05",
    "gemini-2.0-pro-exp-02-05",
    "gemini-2.0-flash-thinking-exp-01-21",
];

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct GenAiConfig {
    #[validate(length(min = 1, message = "API key is required"))]
    pub genai_api_key: String,
    #[validate(custom(function = validate_model))]
    pub genai_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn validate_model(model: &str) -> Result<(), validator::ValidationError> {
    if KNOWN_MODELS.contains(&model) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_model"))
    }
}

impl GenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            genai_api_key: api_key.into(),
            genai_model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GenAiConfig::new("key").validate().is_ok());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(GenAiConfig::new("").validate().is_err());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let mut config = GenAiConfig::new("key");
        config.genai_model = "gpt-4".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_defaults_when_absent() {
        let config: GenAiConfig =
            serde_json::from_str(r#"{"genai_api_key":"k","genai_model":"gemini-2.0-flash"}"#)
                .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
