//! Generative model interface.
//!
//! [`ChatModel`] is the single seam for both contextualization (`invoke`)
//! and answer generation (`stream`). The production implementation talks to
//! the Ollama `/api/chat` endpoint; the streaming variant parses the NDJSON
//! response body incrementally.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::models::{Message, Role};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a message list and wait for the complete response text.
    async fn invoke(&self, messages: &[Message]) -> Result<String>;

    /// Send a message list and yield incremental response fragments.
    async fn stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>>;
}

/// Ollama chat client. Calls are not retried here; retry policy belongs to
/// the caller.
pub struct OllamaChat {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn request<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: wire_role(m.role),
                    content: &m.content,
                })
                .collect(),
            stream,
            options: ChatOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn invoke(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.request(messages, false))
            .send()
            .await
            .map_err(|e| Error::model(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::model(format!(
                "chat failed: HTTP {} - {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::model(format!("invalid chat response: {}", e)))?;
        Ok(parsed.message.content)
    }

    async fn stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.request(messages, true))
            .send()
            .await
            .map_err(|e| Error::model(format!("stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::model(format!(
                "stream failed: HTTP {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct StreamChunk {
            message: ResponseMessage,
        }

        // Each body chunk carries one or more NDJSON lines.
        let stream = response.bytes_stream().map(|chunk| {
            let bytes = chunk.map_err(|e| Error::model(format!("stream error: {}", e)))?;
            let text = String::from_utf8_lossy(&bytes);

            let mut fragment = String::new();
            for line in text.lines() {
                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(line) {
                    fragment.push_str(&parsed.message.content);
                }
            }
            Ok(fragment)
        });

        Ok(stream.boxed())
    }
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Remove a model's thinking scratch block from its output.
///
/// Text without any thinking markers passes through unchanged. An opening
/// marker without the closing one is malformed output and fails the
/// operation rather than shipping raw reasoning to the user.
pub fn strip_thinking(text: &str) -> Result<String> {
    match text.find(THINK_CLOSE) {
        Some(pos) => Ok(text[pos + THINK_CLOSE.len()..].trim_start().to_string()),
        None if text.contains(THINK_OPEN) => Err(Error::MalformedModelOutput),
        None => Ok(text.to_string()),
    }
}
