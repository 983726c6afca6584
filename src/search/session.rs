//! Cookie-carrying HTTP session for the search engine.
//!
//! One session is created per process: the cookie jar is loaded when the
//! session is opened, shared by every request made through it, and written
//! back to disk after each page. Write failures are logged and dropped.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::Client;
use reqwest_cookie_store::CookieStoreMutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::PageFetcher;
use crate::storage;
use crate::types::AnalyzerError;

/// Realistic desktop and mobile browser user agents.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:88.0) Gecko/20100101 Firefox/88.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:88.0) Gecko/20100101 Firefox/88.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:88.0) Gecko/20100101 Firefox/88.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36 Edg/90.0.818.49",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36 OPR/76.0.4017.123",
];

/// Pick a user agent at random.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// HTTP timeout for search engine pages.
const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Search session with a persisted cookie jar.
pub struct SearchSession {
    http: Client,
    jar: Arc<CookieStoreMutex>,
    jar_path: PathBuf,
    user_agent: Option<String>,
}

impl SearchSession {
    /// Open a session, loading the cookie jar at `jar_path`.
    pub fn open(jar_path: PathBuf, verify_ssl: bool) -> Result<Self> {
        let jar = Arc::new(CookieStoreMutex::new(storage::load_cookie_jar(&jar_path)));

        let http = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .cookie_provider(Arc::clone(&jar))
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .context("Failed to build search HTTP client")?;

        Ok(Self {
            http,
            jar,
            jar_path,
            user_agent: None,
        })
    }

    /// Use a fixed user agent instead of a random one per request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn jar_path(&self) -> &PathBuf {
        &self.jar_path
    }

    /// Write the cookie jar to disk. Never fails the caller.
    pub fn persist(&self) {
        let store = match self.jar.lock() {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Cookie jar lock poisoned, skipping save");
                return;
            }
        };
        if let Err(e) = storage::save_cookie_jar(&store, &self.jar_path) {
            warn!(path = %self.jar_path.display(), error = %e, "Failed to save cookie jar");
        }
    }
}

#[async_trait]
impl PageFetcher for SearchSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string());

        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .with_context(|| format!("Search request failed: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            self.persist();
            return Err(AnalyzerError::SearchStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read search page body: {url}"))?;

        self.persist();
        debug!(url, bytes = body.len(), "Search page fetched");
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
