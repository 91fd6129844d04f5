//! One capture → stream → result cycle.
//!
//! The session accumulates stream fragments, leniently decodes the prefix
//! after each one and emits a `Partial` whenever the decode passes partial
//! validation. Fragments that leave the accumulator mid-token are expected
//! and merely logged. Once the stream ends, the provider's buffered full
//! text is merged in and must strict-parse and strict-validate, or the
//! session fails. Cancelling stops fragment consumption; nothing is emitted
//! after cancellation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::{AppError, Result};
use crate::domain::genai_config::GenAiConfig;
use crate::domain::prompt::TRANSLATE_PROMPT;
use crate::domain::schema;
use crate::domain::translation::{PartialTranslationResult, TranslationResult};
use crate::infrastructure::llm_clients::{CompletionProvider, CompletionStream};
use crate::shared::partial_json::decode_lenient;
use crate::shared::response::strip_code_fence;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Partial(PartialTranslationResult),
    Finalized(TranslationResult),
    Failed(AppError),
}

/// Consumer side of a running session. Dropping the handle cancels the
/// session as well.
pub struct SessionHandle {
    events: mpsc::Receiver<SessionEvent>,
    cancel: watch::Sender<bool>,
}

impl SessionHandle {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

pub struct TranslationSession {
    provider: Arc<dyn CompletionProvider>,
}

impl TranslationSession {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub fn start(&self, config: GenAiConfig, image_png: Vec<u8>) -> SessionHandle {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let provider = self.provider.clone();
        tokio::spawn(run(provider, config, image_png, event_tx, cancel_rx));
        SessionHandle {
            events: event_rx,
            cancel: cancel_tx,
        }
    }
}

async fn run(
    provider: Arc<dyn CompletionProvider>,
    config: GenAiConfig,
    image_png: Vec<u8>,
    events: mpsc::Sender<SessionEvent>,
    mut cancel: watch::Receiver<bool>,
) {
    let session_id = Uuid::new_v4();
    debug!(%session_id, model = %config.genai_model, "starting translation session");

    let stream = match provider
        .stream_completion(&config, TRANSLATE_PROMPT, &image_png)
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(SessionEvent::Failed(e)).await;
            return;
        }
    };

    let CompletionStream {
        mut fragments,
        final_text,
    } = stream;
    let mut accumulator = String::new();

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    debug!(%session_id, "session cancelled");
                    return;
                }
            }
            fragment = fragments.recv() => match fragment {
                None => break,
                Some(Err(e)) => {
                    let _ = events.send(SessionEvent::Failed(e)).await;
                    return;
                }
                Some(Ok(text)) => {
                    accumulator.push_str(&text);
                    if let Some(partial) = renderable_partial(&accumulator, &session_id) {
                        if events.send(SessionEvent::Partial(partial)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    let received = tokio::select! {
        _ = cancel.changed() => {
            debug!(%session_id, "session cancelled before finalization");
            return;
        }
        received = final_text => received,
    };
    let full = match received {
        Ok(Ok(full)) => full,
        Ok(Err(e)) => {
            let _ = events.send(SessionEvent::Failed(e)).await;
            return;
        }
        Err(_) => {
            let _ = events
                .send(SessionEvent::Failed(AppError::CompletionFailed(
                    "stream ended without a final response".to_string(),
                )))
                .await;
            return;
        }
    };

    // Some providers resolve the aggregate text, others only the remainder
    // past the last fragment.
    if full.starts_with(&accumulator) {
        accumulator = full;
    } else {
        accumulator.push_str(&full);
    }

    let event = match finalize(&accumulator) {
        Ok(result) => SessionEvent::Finalized(result),
        Err(e) => SessionEvent::Failed(e),
    };
    let _ = events.send(event).await;
}

/// Lenient decode + partial validation of the accumulated prefix. `None`
/// when there is nothing renderable yet, or when the prefix is already a
/// terminated object (the imminent `Finalized` supersedes it).
fn renderable_partial(accumulator: &str, session_id: &Uuid) -> Option<PartialTranslationResult> {
    let cleaned = strip_code_fence(accumulator);
    if serde_json::from_str::<serde_json::Value>(cleaned).is_ok() {
        return None;
    }
    match decode_lenient(cleaned) {
        Ok(Some(value)) => match schema::validate_partial(&value) {
            Ok(partial) => Some(partial),
            Err(issues) => {
                debug!(%session_id, issues = ?issues, "partial decode not yet renderable");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            // Transient parse noise: never aborts the stream.
            debug!(%session_id, error = %e, "skipping unparseable fragment state");
            None
        }
    }
}

fn finalize(accumulator: &str) -> Result<TranslationResult> {
    let cleaned = strip_code_fence(accumulator);
    let value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|e| AppError::InvalidFinalPayload(format!("not valid JSON: {}", e)))?;
    schema::validate_full(&value).map_err(|issues| {
        let joined = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        AppError::InvalidFinalPayload(joined)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::translation::Language;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    struct FakeProvider {
        fragments: Vec<&'static str>,
        hang_after: Option<usize>,
    }

    impl FakeProvider {
        fn streaming(fragments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                fragments,
                hang_after: None,
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeProvider {
        async fn stream_completion(
            &self,
            _config: &GenAiConfig,
            _prompt: &str,
            _image_png: &[u8],
        ) -> Result<CompletionStream> {
            let (tx, rx) = mpsc::channel(8);
            let (final_tx, final_rx) = oneshot::channel();
            let fragments: Vec<String> =
                self.fragments.iter().map(|s| s.to_string()).collect();
            let hang_after = self.hang_after;
            tokio::spawn(async move {
                let mut full = String::new();
                for (i, fragment) in fragments.into_iter().enumerate() {
                    full.push_str(&fragment);
                    if tx.send(Ok(fragment)).await.is_err() {
                        return;
                    }
                    if hang_after == Some(i + 1) {
                        std::future::pending::<()>().await;
                    }
                }
                drop(tx);
                let _ = final_tx.send(Ok(full));
            });
            Ok(CompletionStream {
                fragments: rx,
                final_text: final_rx,
            })
        }

        async fn verify_api_key(&self, _config: &GenAiConfig) -> Result<bool> {
            Ok(true)
        }
    }

    async fn collect(mut handle: SessionHandle) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_streamed_fragments_to_finalized() {
        let provider = FakeProvider::streaming(vec![
            r#"{"detected_language":"ja","ja":"こん"#,
            r#"にちは","en":"Hel"#,
            r#"lo"}"#,
        ]);
        let session = TranslationSession::new(provider);
        let handle = session.start(GenAiConfig::new("key"), vec![0u8]);
        let events = collect(handle).await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Partial(PartialTranslationResult {
                    detected_language: Some(Language::Ja),
                    ja: Some("こん".to_string()),
                    en: None,
                }),
                SessionEvent::Partial(PartialTranslationResult {
                    detected_language: Some(Language::Ja),
                    ja: Some("こんにちは".to_string()),
                    en: Some("Hel".to_string()),
                }),
                SessionEvent::Finalized(TranslationResult {
                    detected_language: Language::Ja,
                    ja: "こんにちは".to_string(),
                    en: "Hello".to_string(),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_partials_are_monotonic() {
        let provider = FakeProvider::streaming(vec![
            r#"{"detected_la"#,
            r#"nguage":"en","#,
            r#""ja":"こ"#,
            r#"んにちは","en":"He"#,
            r#"llo"}"#,
        ]);
        let session = TranslationSession::new(provider);
        let handle = session.start(GenAiConfig::new("key"), vec![0u8]);
        let events = collect(handle).await;

        let mut last = PartialTranslationResult::default();
        for event in &events {
            if let SessionEvent::Partial(partial) = event {
                if last.detected_language.is_some() {
                    assert_eq!(partial.detected_language, last.detected_language);
                }
                for (field, prev) in [(&partial.ja, &last.ja), (&partial.en, &last.en)] {
                    if let Some(prev) = prev {
                        assert!(field.as_deref().unwrap_or("").starts_with(prev.as_str()));
                    }
                }
                last = partial.clone();
            }
        }
        assert!(matches!(events.last(), Some(SessionEvent::Finalized(_))));
    }

    #[tokio::test]
    async fn test_invalid_final_payload_fails() {
        let provider =
            FakeProvider::streaming(vec![r#"{"detected_language":"fr","ja":"x","en":"y"}"#]);
        let session = TranslationSession::new(provider);
        let handle = session.start(GenAiConfig::new("key"), vec![0u8]);
        let events = collect(handle).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            SessionEvent::Failed(AppError::InvalidFinalPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_fenced_final_payload_is_accepted() {
        let provider = FakeProvider::streaming(vec![
            "```json\n",
            r#"{"detected_language":"en","ja":"犬","en":"dog"}"#,
            "\n```",
        ]);
        let session = TranslationSession::new(provider);
        let handle = session.start(GenAiConfig::new("key"), vec![0u8]);
        let events = collect(handle).await;

        assert!(matches!(
            events.last(),
            Some(SessionEvent::Finalized(result)) if result.en == "dog"
        ));
    }

    #[tokio::test]
    async fn test_cancellation_emits_nothing_further() {
        let provider = Arc::new(FakeProvider {
            fragments: vec![r#"{"detected_language":"ja","ja":"こん"#, r#"にちは"}"#],
            hang_after: Some(1),
        });
        let session = TranslationSession::new(provider);
        let mut handle = session.start(GenAiConfig::new("key"), vec![0u8]);

        let first = handle.recv().await.unwrap();
        assert!(matches!(first, SessionEvent::Partial(_)));

        handle.cancel();
        assert_eq!(handle.recv().await, None);
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_as_failed() {
        struct BrokenProvider;

        #[async_trait]
        impl CompletionProvider for BrokenProvider {
            async fn stream_completion(
                &self,
                _config: &GenAiConfig,
                _prompt: &str,
                _image_png: &[u8],
            ) -> Result<CompletionStream> {
                Err(AppError::CompletionFailed("no network".to_string()))
            }

            async fn verify_api_key(&self, _config: &GenAiConfig) -> Result<bool> {
                Ok(false)
            }
        }

        let session = TranslationSession::new(Arc::new(BrokenProvider));
        let handle = session.start(GenAiConfig::new("key"), vec![0u8]);
        let events = collect(handle).await;
        assert_eq!(
            events,
            vec![SessionEvent::Failed(AppError::CompletionFailed(
                "no network".to_string()
            ))]
        );
    }
}
