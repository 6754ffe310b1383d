//! LLM client seam: prompt-completion over an OpenAI-compatible API, plus a
//! scripted mock for tests and the JSON extraction helper used on model
//! output.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One completion request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
}

/// LLM errors.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Prompt-completion client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// HTTP client config (OpenAI-compatible).
#[derive(Debug, Clone)]
pub struct HttpLlmClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpLlmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// LLM client over an OpenAI-compatible chat completions API.
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: HttpLlmClientConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmClientConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {key}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }

        let body = ChatRequest {
            model: request.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user,
                },
            ],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Response("Missing choices".to_string()))
    }
}

/// Scripted client for tests: answers from a queue and records requests.
#[derive(Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn scripted<R>(responses: R) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| LlmError::Response("mock script exhausted".to_string()))
    }
}

/// Pull the first well-formed JSON object out of `text`. Model output tends
/// to bury the object in prose or code fences, and earlier `{` characters in
/// that chatter may never balance, so every opening brace is tried in turn
/// until one yields a parseable object.
pub fn extract_json(text: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(length) = object_span(&text[start..]) {
            let candidate = &text[start..start + length];
            if serde_json::from_str::<serde_json::Value>(candidate)
                .map(|parsed| parsed.is_object())
                .unwrap_or(false)
            {
                return Some(candidate.to_string());
            }
        }
        search_from = start + 1;
    }
    None
}

/// Byte length of the balanced `{...}` group at the start of `text`, or
/// `None` if its braces never balance. String literals are consumed whole so
/// braces inside them do not count toward nesting.
fn object_span(text: &str) -> Option<usize> {
    let mut open_braces = 0usize;
    let mut cursor = text.char_indices();
    while let Some((at, ch)) = cursor.next() {
        match ch {
            '{' => open_braces += 1,
            '}' => {
                open_braces = open_braces.checked_sub(1)?;
                if open_braces == 0 {
                    return Some(at + ch.len_utf8());
                }
            }
            '"' => skip_string_literal(&mut cursor)?,
            _ => {}
        }
    }
    None
}

/// Advance `cursor` past the closing quote of a string literal, honouring
/// backslash escapes. `None` means the literal never closed.
fn skip_string_literal(cursor: &mut std::str::CharIndices<'_>) -> Option<()> {
    while let Some((_, ch)) = cursor.next() {
        match ch {
            '\\' => {
                cursor.next()?;
            }
            '"' => return Some(()),
            _ => {}
        }
    }
    None
}
