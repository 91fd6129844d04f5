use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateInfo {
    pub version: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// `Ok(None)` when the running version is current.
    async fn check(&self, current_version: &str) -> Result<Option<UpdateInfo>>;
}

/// Polls a release manifest (a single JSON document with at least a
/// `version` field) and offers it when it is newer than the running build.
pub struct HttpUpdateChecker {
    client: reqwest::Client,
    manifest_url: String,
}

impl HttpUpdateChecker {
    pub fn new(manifest_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            manifest_url: manifest_url.into(),
        }
    }
}

#[async_trait]
impl UpdateChecker for HttpUpdateChecker {
    async fn check(&self, current_version: &str) -> Result<Option<UpdateInfo>> {
        let response = self
            .client
            .get(&self.manifest_url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("update check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "update check failed: HTTP {}",
                response.status()
            )));
        }

        let info: UpdateInfo = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("invalid release manifest: {}", e)))?;

        if is_newer(&info.version, current_version) {
            Ok(Some(info))
        } else {
            debug!(current = current_version, latest = %info.version, "no update available");
            Ok(None)
        }
    }
}

/// Dotted numeric comparison; non-numeric segments compare as zero.
fn is_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|seg| seg.parse().unwrap_or(0))
            .collect()
    };
    let candidate = parse(candidate);
    let current = parse(current);
    let len = candidate.len().max(current.len());
    for i in 0..len {
        let a = candidate.get(i).copied().unwrap_or(0);
        let b = current.get(i).copied().unwrap_or(0);
        if a != b {
            return a > b;
        }
    }
    false
}
