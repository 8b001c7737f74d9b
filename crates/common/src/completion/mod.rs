//! Completion engine abstraction
//!
//! The language model is an external collaborator reached over an
//! OpenAI-compatible chat-completions API. Answers come back either as one
//! blocking response or as a lazy, finite stream of text fragments.
//!
//! The core never retries a failed call; `ModelUnavailable`/`ModelTimeout`
//! surface to the caller, whose transport layer owns any retry policy.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Lazy, finite, non-restartable sequence of answer fragments.
///
/// Dropping the stream cancels the upstream request and releases the
/// underlying connection.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Trait for completion backends
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Generate a full answer for the prompt (blocking call).
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Generate an answer as an incremental fragment stream.
    async fn complete_stream(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TokenStream>;
}

// ============ OpenAI-compatible client ============

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Client for OpenAI-compatible chat-completions endpoints.
///
/// The rendered prompt is sent as a single user message; grounding
/// instructions live in the prompt template, not in a system message.
pub struct OpenAICompletion {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAICompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "llm.api_key required for the completion engine".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::ModelTimeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            AppError::ModelUnavailable {
                message: e.to_string(),
            }
        }
    }

    async fn send(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature,
            stream,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ModelUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionEngine for OpenAICompletion {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let response = self.send(prompt, max_tokens, temperature, false).await?;

        let chat_response: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::ModelUnavailable {
                    message: format!("Failed to parse response: {}", e),
                })?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| AppError::ModelUnavailable {
                message: "Empty response from completion engine".to_string(),
            })
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TokenStream> {
        let response = self.send(prompt, max_tokens, temperature, true).await?;
        let timeout_secs = self.timeout_secs;

        // Walk the SSE body: each `data:` line carries one delta, the
        // `[DONE]` sentinel ends the stream. Dropping the returned stream
        // drops the response body and aborts the request.
        let fragments = stream::unfold(
            (response.bytes_stream().boxed(), String::new()),
            move |(mut body, mut buffer)| async move {
                loop {
                    while let Some(pos) = buffer.find('\n') {
                        let line: String = buffer.drain(..=pos).collect();
                        let line = line.trim();
                        let data = match line.strip_prefix("data:") {
                            Some(d) => d.trim(),
                            None => continue,
                        };
                        if data == "[DONE]" {
                            return None;
                        }
                        if let Some(fragment) = parse_stream_delta(data) {
                            return Some((Ok(fragment), (body, buffer)));
                        }
                    }

                    match body.next().await {
                        Some(Ok(chunk)) => {
                            buffer.push_str(&String::from_utf8_lossy(&chunk));
                        }
                        Some(Err(e)) => {
                            let err = if e.is_timeout() {
                                AppError::ModelTimeout { timeout_secs }
                            } else {
                                AppError::ModelUnavailable {
                                    message: e.to_string(),
                                }
                            };
                            return Some((Err(err), (body, buffer)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(fragments.boxed())
    }
}

/// Extract the delta text from one SSE data payload.
///
/// Non-JSON keep-alives and deltas without content (role announcements,
/// finish markers) yield `None`.
fn parse_stream_delta(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let content = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

// ============ Mock engine ============

/// Recorded arguments of one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Deterministic completion engine for tests.
///
/// Replies with a fixed string and records every call so tests can assert
/// which path ran and with which budget.
pub struct MockCompletion {
    reply: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletion {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock completion poisoned").clone()
    }

    fn record(&self, prompt: &str, max_tokens: u32, temperature: f32) {
        self.calls
            .lock()
            .expect("mock completion poisoned")
            .push(RecordedCall {
                prompt: prompt.to_string(),
                max_tokens,
                temperature,
            });
    }
}

#[async_trait]
impl CompletionEngine for MockCompletion {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        self.record(prompt, max_tokens, temperature);
        Ok(self.reply.clone())
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TokenStream> {
        self.record(prompt, max_tokens, temperature);
        let fragments: Vec<Result<String>> = self
            .reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}
