//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and field has a default, so an empty file is a valid config.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::data::extractor::ExtractorSettings;
use crate::engine::analyzer::AnalyzerSettings;
use crate::llm;
use crate::search::google::SearchSettings;
use crate::storage::default_cookie_jar_path;
use crate::types::LinkCount;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub extractor: ExtractorConfig,
    pub watchlist: Watchlist,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Links resolved per asset and date.
    pub link_count: LinkCount,
    /// Token budget for the assembled article document.
    pub max_prompt_tokens: usize,
    /// Output budget for the one-word sentiment answer.
    pub sentiment_max_tokens: u32,
    /// Model used for reports; sentiment uses `llm.model`. Unset picks the
    /// provider's report default.
    pub report_model: Option<String>,
    pub report_max_words: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            link_count: LinkCount::DEFAULT,
            max_prompt_tokens: 3000,
            sentiment_max_tokens: 5,
            report_model: None,
            report_max_words: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai` or `anthropic`.
    pub provider: String,
    /// Unset uses the provider's default model.
    pub model: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
    /// Override for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 1024,
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub tld: String,
    pub lang: String,
    pub country: String,
    pub safe: String,
    pub page_size: usize,
    pub pause_ms: u64,
    /// Results requested per query variant.
    pub batch_size: usize,
    pub verify_ssl: bool,
    /// Defaults to `$HOME/.google-cookie`.
    pub cookie_jar: Option<PathBuf>,
    /// Fixed user agent; unset rotates a random browser agent per request.
    pub user_agent: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tld: "com".to_string(),
            lang: "en".to_string(),
            country: String::new(),
            safe: "off".to_string(),
            page_size: 10,
            pause_ms: 500,
            batch_size: 4,
            verify_ssl: true,
            cookie_jar: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractorConfig {
    pub timeout_secs: u64,
    pub delay_ms: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            delay_ms: 500,
        }
    }
}

/// The asset universe, loaded once at startup.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Watchlist {
    pub commodities: Vec<String>,
    pub forex: Vec<String>,
}

const COMMODITIES: &[&str] = &["HG=F", "BZ=F", "CL=F", "GC=F", "NG=F", "SI=F", "CC=F"];

const FOREX: &[&str] = &[
    "AUDCHF", "AUDJPY", "AUDUSD", "CADCHF", "CADJPY", "CHFJPY", "EURAUD", "EURCAD",
    "EURCHF", "EURGBP", "EURJPY", "EURUSD", "GBPAUD", "GBPJPY", "GBPUSD", "NZDCHF",
    "NZDJPY", "NZDUSD", "USDCAD", "USDCHF", "USDJPY",
];

impl Default for Watchlist {
    fn default() -> Self {
        Self {
            commodities: COMMODITIES.iter().map(|s| s.to_string()).collect(),
            forex: FOREX.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Watchlist {
    /// Commodities first, then forex pairs.
    pub fn all(&self) -> Vec<String> {
        self.commodities.iter().chain(self.forex.iter()).cloned().collect()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.commodities.iter().chain(self.forex.iter()).any(|a| a == asset)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            tld: self.search.tld.clone(),
            safe: self.search.safe.clone(),
            page_size: self.search.page_size,
            pause: Duration::from_millis(self.search.pause_ms),
        }
    }

    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            timeout: Duration::from_secs(self.extractor.timeout_secs),
            delay: Duration::from_millis(self.extractor.delay_ms),
        }
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            link_count: self.analyzer.link_count,
            max_prompt_tokens: self.analyzer.max_prompt_tokens,
            sentiment_model: self.llm.model.clone(),
            sentiment_max_tokens: self.analyzer.sentiment_max_tokens,
            report_model: self
                .analyzer
                .report_model
                .clone()
                .or_else(|| llm::default_report_model(&self.llm.provider).map(str::to_string)),
        }
    }

    pub fn cookie_jar_path(&self) -> PathBuf {
        self.search
            .cookie_jar
            .clone()
            .unwrap_or_else(default_cookie_jar_path)
    }
}
