pub mod gemini;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::error::Result;
use crate::domain::genai_config::GenAiConfig;

/// A live completion: incremental text fragments plus the full buffered
/// response once generation ends. Dropping the fragment receiver cancels
/// consumption on the provider side.
pub struct CompletionStream {
    pub fragments: mpsc::Receiver<Result<String>>,
    pub final_text: oneshot::Receiver<Result<String>>,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Starts a streamed completion for the fixed prompt plus an inline PNG
    /// image payload.
    async fn stream_completion(
        &self,
        config: &GenAiConfig,
        prompt: &str,
        image_png: &[u8],
    ) -> Result<CompletionStream>;

    /// Cheap credential probe used by the config form.
    async fn verify_api_key(&self, config: &GenAiConfig) -> Result<bool>;
}
