//! LLM integration for news sentiment and report writing.
//!
//! Defines the `LlmClient` trait and provides implementations for
//! OpenAI chat completions and the Anthropic Messages API.

pub mod anthropic;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;

use crate::config::LlmConfig;

/// One completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    /// Output budget; the client default applies when absent.
    pub max_output_tokens: Option<u32>,
    /// Model override; the client default applies when absent.
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Raw model output plus accounting for the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
    pub cost: f64,
}

/// Abstraction over text-completion providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the model's text verbatim.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Default model identifier.
    fn model_name(&self) -> &str;
}

/// Build the configured provider's client.
///
/// Fails with `AnalyzerError::MissingCredential` when the key is empty.
/// With no `llm.model` set, each client uses its own provider's default.
pub fn build_client(config: &LlmConfig, api_key: SecretString) -> Result<Arc<dyn LlmClient>> {
    let model = config.model.clone();
    let client: Arc<dyn LlmClient> = match config.provider.as_str() {
        "openai" => {
            let mut client = openai::OpenAiClient::new(api_key, model, Some(config.max_tokens))?;
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
        "anthropic" => Arc::new(anthropic::AnthropicClient::new(
            api_key,
            model,
            Some(config.max_tokens),
        )?),
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    };
    Ok(client)
}

/// Report model for `provider` when none is configured. `None` leaves the
/// choice to the client's default model.
pub fn default_report_model(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some(openai::REPORT_MODEL),
        _ => None,
    }
}

/// Resolve the API key named by `llm.api_key_env`.
///
/// An unset variable becomes an empty key, which the client
/// constructors reject as a missing credential.
pub fn resolve_api_key(config: &LlmConfig) -> SecretString {
    let key = std::env::var(&config.api_key_env).unwrap_or_default();
    SecretString::new(key)
}

/// Parse an HTTP error body into a short message, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Join a base URL and an endpoint path with exactly one slash.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
