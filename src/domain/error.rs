use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppError {
    CaptureFailed(String),
    CredentialMissing,
    InvalidFinalPayload(String),
    CompletionFailed(String),
    StorageError(String),
    ParseError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            AppError::CredentialMissing => write!(f, "No API key configured"),
            AppError::InvalidFinalPayload(msg) => write!(f, "Invalid final payload: {}", msg),
            AppError::CompletionFailed(msg) => write!(f, "Completion failed: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
