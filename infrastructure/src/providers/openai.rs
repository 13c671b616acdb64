//! OpenAI-compatible chat completions adapter
//!
//! Streams `POST {base_url}/chat/completions` with `stream: true` and turns
//! the server-sent `data:` lines into [`StreamEvent`]s.

use crate::config::FileOpenAiConfig;
use async_trait::async_trait;
use chatwire_application::ports::language_model::{
    GatewayError, LanguageModel, LanguageModelRequest, StreamEvent, StreamHandle,
};
use chatwire_domain::ChatMessage;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const STREAM_BUFFER: usize = 64;

#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("No API key: set {0} or openai.api_key")]
    MissingApiKey(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// One parsed server-sent line.
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Delta(String),
    Done,
    /// Comments, keep-alives, role-only deltas
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())
            .map_or(SseLine::Skip, SseLine::Delta),
        Err(e) => {
            warn!(error = %e, "Skipping unparseable stream chunk");
            SseLine::Skip
        }
    }
}

/// Splits a byte stream into lines. Bytes are only decoded once a line is
/// complete, so characters cut across network chunks survive.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

/// A model served by an OpenAI-compatible endpoint.
pub struct OpenAiModel {
    id: String,
    model: String,
    endpoint: String,
    api_key: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiModel {
    pub fn new(config: &FileOpenAiConfig, model: &str) -> Result<Self, OpenAiError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| OpenAiError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self {
            id: format!("openai/{}", model),
            model: model.to_string(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            max_tokens: config.max_tokens,
            client: reqwest::Client::builder().build()?,
        })
    }

    async fn pump(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut full_text = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return;
                }
            };
            for line in lines.push(&bytes) {
                match parse_sse_line(&line) {
                    SseLine::Delta(delta) => {
                        trace!(bytes = delta.len(), "Stream delta");
                        full_text.push_str(&delta);
                        if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                            debug!("Stream receiver dropped, stopping");
                            return;
                        }
                    }
                    SseLine::Done => {
                        let _ = tx.send(StreamEvent::Completed(full_text)).await;
                        return;
                    }
                    SseLine::Skip => {}
                }
            }
        }
        let _ = tx.send(StreamEvent::Completed(full_text)).await;
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn request(&self, request: LanguageModelRequest) -> Result<StreamHandle, GatewayError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            stream: true,
            max_tokens: self.max_tokens,
        };
        debug!(model = %self.model, messages = request.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(match status.as_u16() {
                404 => GatewayError::ModelNotAvailable(self.model.clone()),
                _ => GatewayError::RequestFailed(format!("{}: {}", status, error_body)),
            });
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(Self::pump(response, tx));
        Ok(StreamHandle::new(rx))
    }
}
