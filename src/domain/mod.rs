pub mod error;
pub mod genai_config;
pub mod prompt;
pub mod schema;
pub mod translation;
