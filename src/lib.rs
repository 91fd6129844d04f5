//! Core of a screenshot-translation utility: the user freezes the screen,
//! selects a region, and the crop is streamed through a multimodal model
//! that answers with one JSON object (detected language, Japanese text,
//! English text). The page state machine drives the lifecycle, the
//! translation session turns the token stream into render-safe partial and
//! final results, and a bounded history retains what was translated.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::use_cases::history::HistoryStore;
pub use application::use_cases::page::{Effect, Page, PageController, PageEvent};
pub use application::use_cases::page_flow::{FlowCommand, PageFlow, UiUpdate};
pub use application::use_cases::session::{SessionEvent, SessionHandle, TranslationSession};
pub use domain::error::{AppError, Result};
pub use domain::genai_config::GenAiConfig;
pub use domain::translation::{
    HistoryEntry, Language, PartialTranslationResult, TranslationResult,
};
pub use infrastructure::bootstrap::{init_tracing, setup};
pub use infrastructure::capture::{CaptureSurface, ScreenCapture, Screenshot};
pub use infrastructure::llm_clients::{CompletionProvider, CompletionStream};
pub use infrastructure::storage::{ConfigStore, FileConfigStore, FileHistoryStore, HistoryPersistence};
pub use infrastructure::update::{HttpUpdateChecker, UpdateChecker, UpdateInfo};
