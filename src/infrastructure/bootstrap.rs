//! Wires the production collaborators into a ready-to-run `PageFlow`.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::use_cases::page_flow::{PageFlow, UiUpdate};
use crate::domain::error::Result;
use crate::infrastructure::capture::ScreenCapture;
use crate::infrastructure::llm_clients::gemini::GeminiClient;
use crate::infrastructure::storage::{resolve_app_data_dir, FileConfigStore, FileHistoryStore};
use crate::infrastructure::update::HttpUpdateChecker;

pub const APP_NAME: &str = "snaplate";
pub const RELEASE_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/snaplate/snaplate/main/latest.json";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

pub async fn setup() -> Result<(PageFlow, mpsc::Receiver<UiUpdate>)> {
    let app_data_dir = resolve_app_data_dir(APP_NAME)?;

    PageFlow::new(
        Arc::new(GeminiClient::new()),
        Arc::new(ScreenCapture),
        Arc::new(FileConfigStore::new(&app_data_dir)),
        Arc::new(FileHistoryStore::new(&app_data_dir)),
        Arc::new(HttpUpdateChecker::new(RELEASE_MANIFEST_URL)),
        env!("CARGO_PKG_VERSION").to_string(),
    )
    .await
}
