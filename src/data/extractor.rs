//! Article page fetching.
//!
//! Each call builds its own client, waits a short politeness delay, sends a
//! single GET with a random browser user agent and a hard timeout, then
//! runs main-content extraction on the HTML. Every failure is folded into
//! the returned `ArticleText` so one bad link never affects its siblings.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::readability::extract_main_text;
use super::ArticleSource;
use crate::search::session::random_user_agent;
use crate::types::{ArticleText, ExtractFailure};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Overall budget for one page, connect through body.
    pub timeout: Duration,
    /// Wait before each request.
    pub delay: Duration,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

/// Fetches news pages and extracts their main text.
#[derive(Debug, Clone, Default)]
pub struct WebExtractor {
    settings: ExtractorSettings,
}

impl WebExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ExtractFailure> {
        if !self.settings.delay.is_zero() {
            tokio::time::sleep(self.settings.delay).await;
        }

        let client = Client::builder()
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| ExtractFailure::Request(e.to_string()))?;

        let response = client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractFailure::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.is_empty() && !is_text_payload(&content_type) {
            return Err(ExtractFailure::NonText(content_type));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                ExtractFailure::Timeout
            } else {
                ExtractFailure::Body(e.to_string())
            }
        })
    }
}

fn is_text_payload(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
}

fn classify(e: reqwest::Error) -> ExtractFailure {
    if e.is_timeout() {
        ExtractFailure::Timeout
    } else if e.is_connect() {
        ExtractFailure::Connect(e.to_string())
    } else {
        ExtractFailure::Request(e.to_string())
    }
}

#[async_trait]
impl ArticleSource for WebExtractor {
    async fn extract(&self, url: &str) -> ArticleText {
        match self.fetch_html(url).await {
            Ok(html) => {
                let text = extract_main_text(&html, url);
                debug!(url, chars = text.len(), "Article extracted");
                ArticleText::extracted(url, text)
            }
            Err(reason) => {
                warn!(url, reason = %reason, "Article extraction failed, using empty text");
                ArticleText::failed(url, reason)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
