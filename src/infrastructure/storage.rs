//! Persisted JSON state: one file per concern, a single top-level key each
//! (`"config"` in `config.json`, `"history"` in `history.json`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::warn;
use validator::Validate;

use crate::domain::error::{AppError, Result};
use crate::domain::genai_config::GenAiConfig;
use crate::domain::translation::HistoryEntry;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_KEY: &str = "config";
pub const HISTORY_FILE_NAME: &str = "history.json";
pub const HISTORY_KEY: &str = "history";

const API_KEY_ENV_VAR: &str = "GENAI_API_KEY";

pub fn resolve_app_data_dir(app_name: &str) -> std::io::Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no data directory available")
    })?;
    let app_data_dir = base.join(app_name);
    ensure_dir(&app_data_dir)?;
    Ok(app_data_dir)
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// One JSON file holding a single value under a fixed top-level key.
pub struct JsonStore {
    path: PathBuf,
    key: &'static str,
}

impl JsonStore {
    pub fn new(path: PathBuf, key: &'static str) -> Self {
        Self { path, key }
    }

    async fn load_value(&self) -> Result<Option<Value>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut root: Value = match serde_json::from_str(&text) {
            Ok(root) => root,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "stored file is not valid JSON");
                return Ok(None);
            }
        };
        Ok(root.get_mut(self.key).map(Value::take))
    }

    async fn save_value(&self, value: Value) -> Result<()> {
        let root = Value::Object(serde_json::Map::from_iter([(self.key.to_string(), value)]));
        let text = serde_json::to_string_pretty(&root)
            .map_err(|e| AppError::StorageError(e.to_string()))?;
        fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// `None` means absent or invalid: the caller routes to config entry.
    async fn load(&self) -> Result<Option<GenAiConfig>>;
    async fn save(&self, config: &GenAiConfig) -> Result<()>;
}

#[async_trait]
pub trait HistoryPersistence: Send + Sync {
    async fn load(&self) -> Result<Vec<HistoryEntry>>;
    async fn save(&self, entries: &[HistoryEntry]) -> Result<()>;
}

pub struct FileConfigStore {
    store: JsonStore,
}

impl FileConfigStore {
    pub fn new(app_data_dir: &Path) -> Self {
        Self {
            store: JsonStore::new(app_data_dir.join(CONFIG_FILE_NAME), CONFIG_KEY),
        }
    }

    /// Development fallback: an API key from the environment (optionally via
    /// `.env.local`) stands in for a saved config.
    fn env_config() -> Option<GenAiConfig> {
        dotenvy::from_filename(".env.local").ok();
        let key = std::env::var(API_KEY_ENV_VAR).ok()?;
        if key.is_empty() {
            return None;
        }
        Some(GenAiConfig::new(key))
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<Option<GenAiConfig>> {
        let Some(value) = self.store.load_value().await? else {
            return Ok(Self::env_config());
        };
        let config: GenAiConfig = match serde_json::from_value(value) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "stored config does not match the expected shape");
                return Ok(Self::env_config());
            }
        };
        if config.validate().is_err() {
            warn!("stored config failed validation");
            return Ok(Self::env_config());
        }
        Ok(Some(config))
    }

    async fn save(&self, config: &GenAiConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| AppError::StorageError(format!("refusing to save invalid config: {}", e)))?;
        let value =
            serde_json::to_value(config).map_err(|e| AppError::StorageError(e.to_string()))?;
        self.store.save_value(value).await
    }
}

pub struct FileHistoryStore {
    store: JsonStore,
}

impl FileHistoryStore {
    pub fn new(app_data_dir: &Path) -> Self {
        Self {
            store: JsonStore::new(app_data_dir.join(HISTORY_FILE_NAME), HISTORY_KEY),
        }
    }
}

#[async_trait]
impl HistoryPersistence for FileHistoryStore {
    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        let Some(value) = self.store.load_value().await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_value(value) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A corrupt history is dropped rather than blocking startup.
                warn!(error = %e, "stored history does not match the expected shape");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        let value =
            serde_json::to_value(entries).map_err(|e| AppError::StorageError(e.to_string()))?;
        self.store.save_value(value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::translation::{Language, TranslationResult};

    fn sample_entry() -> HistoryEntry {
        HistoryEntry {
            result: TranslationResult {
                detected_language: Language::Ja,
                ja: "犬".to_string(),
                en: "dog".to_string(),
            },
            time: "2025-03-01T12:00:00Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());
        let config = GenAiConfig::new("secret");
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(config));
    }

    #[tokio::test]
    async fn test_config_file_uses_top_level_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());
        store.save(&GenAiConfig::new("secret")).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        let root: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(root[CONFIG_KEY]["genai_api_key"], "secret");
    }

    #[tokio::test]
    async fn test_invalid_config_refused_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());
        assert!(store.save(&GenAiConfig::new("")).await.is_err());
    }

    #[tokio::test]
    async fn test_history_round_trip_with_iso_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        store.save(&[sample_entry()]).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join(HISTORY_FILE_NAME)).unwrap();
        let root: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(root[HISTORY_KEY][0]["time"], "2025-03-01T12:00:00Z");

        assert_eq!(store.load().await.unwrap(), vec![sample_entry()]);
    }

    #[tokio::test]
    async fn test_missing_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(HISTORY_FILE_NAME),
            r#"{"history": "not an array"}"#,
        )
        .unwrap();
        let store = FileHistoryStore::new(dir.path());
        assert!(store.load().await.unwrap().is_empty());
    }
}
