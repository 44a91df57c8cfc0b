//! llm.rs — Chat-completions client for the hosted language model.
//!
//! Mistral exposes an OpenAI-compatible /v1/chat/completions endpoint, so any
//! compatible server (OpenRouter, Ollama, llama.cpp) works by changing the
//! base URL in the config.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected LLM response: {0}")]
    MalformedResponse(String),
}

/// Something that can answer a system + user prompt pair with text.
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

// ─── Request types (OpenAI-compatible) ──────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

// ─── Client ─────────────────────────────────────────────────────────────────

pub struct LlmClient {
    http: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn from_config(cfg: &LlmConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        let api_key = cfg.api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!("No LLM API key configured, every question will use the rule-based fallback");
        } else {
            tracing::info!(model = %cfg.model, base_url = %cfg.base_url, "LLM client ready");
        }

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }
}

impl CompletionBackend for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: system },
                Message { role: "user", content: user },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("LLM call → {}", self.endpoint);

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status,
                body: body.chars().take(300).collect(),
            });
        }

        let json: Value = resp.json().await?;
        extract_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(json: &Value) -> Result<String, LlmError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            let raw = json.to_string();
            LlmError::MalformedResponse(raw.chars().take(200).collect())
        })
}
