//! OpenAI chat completions client.
//!
//! The default provider. Sentiment calls run on a small, cheap model with a
//! tiny output budget; reports override the model per request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{endpoint, error_message, Completion, CompletionRequest, LlmClient};
use crate::types::AnalyzerError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Model used for reports unless one is configured.
pub const REPORT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 1024;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;

/// Approximate cost per 1K input tokens.
const INPUT_COST_PER_1K: f64 = 0.005;
/// Approximate cost per 1K output tokens.
const OUTPUT_COST_PER_1K: f64 = 0.015;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
    backoff: Duration,
    total_cost: AtomicU64, // micro-dollars
    total_calls: AtomicU64,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(AnalyzerError::MissingCredential.into());
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            http,
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            backoff: Duration::from_millis(BASE_BACKOFF_MS),
            total_cost: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
        })
    }

    /// Point the client at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn cumulative_cost(&self) -> f64 {
        self.total_cost.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        ChatRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            max_tokens: request.max_output_tokens.unwrap_or(self.max_tokens),
            messages,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = self.build_body(request);
        let url = endpoint(&self.base_url, "chat/completions");
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = self.backoff * 2u32.pow(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying OpenAI API call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .await;

            let response = match resp {
                Ok(r) => r,
                Err(e) => {
                    warn!(attempt, error = %e, "OpenAI request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: ChatResponse = response
                    .json()
                    .await
                    .context("Failed to parse OpenAI response")?;

                let text = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message)
                    .and_then(|m| m.content)
                    .unwrap_or_default();
                let usage = parsed.usage.unwrap_or_default();

                let cost = (usage.prompt_tokens as f64 / 1000.0) * INPUT_COST_PER_1K
                    + (usage.completion_tokens as f64 / 1000.0) * OUTPUT_COST_PER_1K;
                self.total_cost
                    .fetch_add((cost * 1_000_000.0) as u64, Ordering::Relaxed);
                self.total_calls.fetch_add(1, Ordering::Relaxed);

                debug!(
                    model = body.model,
                    tokens = usage.prompt_tokens + usage.completion_tokens,
                    cost,
                    "OpenAI completion"
                );
                return Ok(Completion {
                    text,
                    tokens_used: usage.prompt_tokens + usage.completion_tokens,
                    cost,
                });
            }

            let error_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                warn!(status = %status, attempt, "Retryable OpenAI error");
                last_error = Some(format!("HTTP {status}: {}", error_message(&error_text)));
                continue;
            }

            anyhow::bail!("OpenAI API error {status}: {}", error_message(&error_text));
        }

        anyhow::bail!(
            "OpenAI API failed after {MAX_RETRIES} retries: {}",
            last_error.unwrap_or_default()
        )
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
