//! Client for the hosted language model that writes the empathetic reply.
//!
//! Any OpenAI-compatible `/chat/completions` endpoint works (OpenAI,
//! OpenRouter, a local llama.cpp or Ollama server). Only the built prompt
//! crosses this boundary.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeneratorConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("language model timed out after {0:?}")]
    Timeout(Duration),
    #[error("language model unreachable: {0}")]
    Transport(String),
    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model returned an empty reply")]
    EmptyResponse,
    #[error("could not decode language model reply: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_response(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Runs `generator` but gives up after `limit`.
pub async fn generate_with_timeout(
    generator: &dyn ResponseGenerator,
    prompt: &str,
    limit: Duration,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(limit, generator.generate_response(prompt)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("language model call exceeded {limit:?}");
            Err(GenerationError::Timeout(limit))
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(cfg: &GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("failed to build language model HTTP client")?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout: cfg.timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ResponseGenerator for ChatCompletionsClient {
    async fn generate_response(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout)
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        let reply = extract_reply(parsed)?;
        debug!(chars = reply.len(), "language model reply received");
        Ok(reply)
    }
}

fn extract_reply(parsed: ChatResponse) -> Result<String, GenerationError> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(GenerationError::EmptyResponse)
}
