//! Client for an Ollama-style local model server.
//!
//! Primary path is the chat endpoint; on failure the client falls back to
//! the plain completion endpoint with a flattened prompt. Both endpoints may
//! answer with NDJSON streams even when `stream: false` is requested, so
//! response bodies are merged fragment by fragment.

use crate::error::ProviderError;
use crate::traits::ModelClient;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use warden_core::{ChatMessage, Role};

/// Configuration for the local model client.
#[derive(Debug, Clone)]
pub struct LocalModelConfig {
    /// Base URL of the model server.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate per response.
    pub num_predict: i64,
    /// Wall-clock timeout per request.
    pub timeout: Duration,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            temperature: 0.2,
            num_predict: 512,
            timeout: Duration::from_secs(120),
        }
    }
}

/// HTTP client for the local model server.
pub struct LocalModelClient {
    config: LocalModelConfig,
    client: Client,
}

impl LocalModelClient {
    /// Create a new client with the request timeout applied.
    pub fn new(config: LocalModelConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.model,
            "messages": messages
                .iter()
                .map(|m| json!({"role": m.role.to_string(), "content": m.content}))
                .collect::<Vec<_>>(),
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.num_predict,
            },
        });

        let url = format!("{}/api/chat", self.config.base_url);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
        }

        let text = response.text().await?;
        extract_chat_content(&text)
            .ok_or_else(|| ProviderError::Api("chat response had no content".to_string()))
    }

    async fn completion(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.model,
            "prompt": completion_prompt(messages),
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.num_predict,
            },
        });

        let url = format!("{}/api/generate", self.config.base_url);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
        }

        let text = response.text().await?;
        extract_completion_content(&text)
            .ok_or_else(|| ProviderError::Api("completion response had no content".to_string()))
    }
}

#[async_trait]
impl ModelClient for LocalModelClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        match self.chat(messages).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::debug!(error = %e, "chat endpoint failed, trying completion endpoint");
                self.completion(messages).await
            }
        }
    }
}

/// Flatten a conversation for the completion endpoint: system messages
/// first, then `User:`/`Assistant:` turns, ending with an open `Assistant:`.
fn completion_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();

    for message in messages.iter().filter(|m| m.role == Role::System) {
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }

    for message in messages.iter().filter(|m| m.role != Role::System) {
        let label = match message.role {
            // Tool results travel on the user side of the transcript.
            Role::User | Role::Tool => "User",
            Role::Assistant => "Assistant",
            Role::System => unreachable!(),
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }

    prompt.push_str("Assistant:");
    prompt
}

/// Merge a chat response body: a single JSON object or an NDJSON stream of
/// `message.content` fragments.
fn extract_chat_content(body: &str) -> Option<String> {
    merge_fragments(body, |value| {
        value
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
    })
}

/// Merge a completion response body: `response` fragments.
fn extract_completion_content(body: &str) -> Option<String> {
    merge_fragments(body, |value| value.get("response").and_then(Value::as_str))
}

fn merge_fragments(body: &str, pick: fn(&Value) -> Option<&str>) -> Option<String> {
    let mut merged = String::new();
    let mut any = false;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).ok()?;
        if let Some(fragment) = pick(&value) {
            merged.push_str(fragment);
            any = true;
        }
    }

    any.then_some(merged)
}
