use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{CompletionProvider, CompletionStream};
use crate::domain::error::{AppError, Result};
use crate::domain::genai_config::GenAiConfig;
use crate::domain::prompt::RESPONSE_JSON_SCHEMA;

const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

fn safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_HARASSMENT",
    ]
    .iter()
    .map(|category| SafetySetting {
        category: category.to_string(),
        threshold: "BLOCK_NONE".to_string(),
    })
    .collect()
}

pub struct GeminiClient {
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn api_key(config: &GenAiConfig) -> Result<String> {
        let key = config.genai_api_key.trim();
        if key.is_empty() {
            return Err(AppError::CredentialMissing);
        }
        Ok(key.to_string())
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn stream_completion(
        &self,
        config: &GenAiConfig,
        prompt: &str,
        image_png: &[u8],
    ) -> Result<CompletionStream> {
        let api_key = Self::api_key(config)?;
        let base_url = config.base_url.trim_end_matches('/');
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            base_url, config.genai_model, api_key
        );

        let body = GenerateRequest {
            contents: vec![
                Content {
                    role: "user".to_string(),
                    parts: vec![Part {
                        text: Some(prompt.to_string()),
                        inline_data: None,
                    }],
                },
                Content {
                    role: "user".to_string(),
                    parts: vec![Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: "image/png".to_string(),
                            data: general_purpose::STANDARD.encode(image_png),
                        }),
                    }],
                },
            ],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
                response_schema: RESPONSE_JSON_SCHEMA.clone(),
            },
            safety_settings: safety_settings(),
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::CompletionFailed(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::CompletionFailed(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let (fragment_tx, fragment_rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let (final_tx, final_rx) = oneshot::channel();

        tokio::spawn(pump_sse(response, fragment_tx, final_tx));

        Ok(CompletionStream {
            fragments: fragment_rx,
            final_text: final_rx,
        })
    }

    async fn verify_api_key(&self, config: &GenAiConfig) -> Result<bool> {
        let api_key = Self::api_key(config)?;
        let base_url = config.base_url.trim_end_matches('/');
        let url = format!("{}/models", base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| AppError::CompletionFailed(format!("Request failed: {}", e)))?;

        Ok(response.status().is_success())
    }
}

/// Reads the SSE body, forwarding each text delta as a fragment and finally
/// resolving the buffered full text. Stops early when the fragment receiver
/// is dropped.
async fn pump_sse(
    response: reqwest::Response,
    fragment_tx: mpsc::Sender<Result<String>>,
    final_tx: oneshot::Sender<Result<String>>,
) {
    let mut byte_stream = response.bytes_stream();
    let mut line_buffer = String::new();
    let mut full_text = String::new();

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = fragment_tx
                    .send(Err(AppError::CompletionFailed(format!(
                        "Stream read error: {}",
                        e
                    ))))
                    .await;
                return;
            }
        };
        line_buffer.push_str(&String::from_utf8_lossy(&chunk));

        // SSE events are newline-delimited; a chunk may end mid-line.
        while let Some(newline) = line_buffer.find('\n') {
            let line: String = line_buffer.drain(..=newline).collect();
            let Some(delta) = text_delta(line.trim_end()) else {
                continue;
            };
            if delta.is_empty() {
                continue;
            }
            full_text.push_str(&delta);
            if fragment_tx.send(Ok(delta)).await.is_err() {
                debug!("fragment receiver dropped, abandoning completion stream");
                return;
            }
        }
    }

    drop(fragment_tx);
    let _ = final_tx.send(Ok(full_text));
}

fn text_delta(line: &str) -> Option<String> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let json: Value = serde_json::from_str(data).ok()?;
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}
