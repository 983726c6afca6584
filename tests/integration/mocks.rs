//! Deterministic stand-ins for the network seams.
//!
//! `FakeGoogle` serves synthetic search pages through the real
//! `GoogleSearch` parser, `StubArticles` replaces page extraction and
//! `ScriptedLlm` records prompts and replays fixed answers. Nothing here
//! touches the network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use asset_sentiment::data::news::NewsLinkResolver;
use asset_sentiment::data::ArticleSource;
use asset_sentiment::engine::analyzer::{AnalyzerSettings, SentimentAnalyzer};
use asset_sentiment::llm::{Completion, CompletionRequest, LlmClient};
use asset_sentiment::search::google::{GoogleSearch, SearchSettings};
use asset_sentiment::search::PageFetcher;
use asset_sentiment::types::{ArticleText, ExtractFailure};

// ---------------------------------------------------------------------------
// Search engine
// ---------------------------------------------------------------------------

/// In-memory search engine keyed by query text.
#[derive(Default)]
pub struct FakeGoogle {
    results: HashMap<String, Vec<String>>,
    /// Queries answered with a page that has no anchors at all.
    broken: Vec<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeGoogle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result hrefs for a query, exactly as they appear in the page.
    pub fn with_results(mut self, query: &str, hrefs: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), hrefs.iter().map(|h| h.to_string()).collect());
        self
    }

    pub fn with_broken_page(mut self, query: &str) -> Self {
        self.broken.push(query.to_string());
        self
    }

    /// Every URL fetched so far, home pages included.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn results_page(&self, url: &Url) -> String {
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let q = params.get("q").cloned().unwrap_or_default();

        if self.broken.contains(&q) {
            return "<html><body><p>Our systems have detected unusual traffic.</p></body></html>".into();
        }

        // Everything fits on the first page; later pages repeat it.
        let anchors: String = self
            .results
            .get(&q)
            .map(|hrefs| {
                hrefs
                    .iter()
                    .map(|h| format!("<div class=\"g\"><a href=\"{h}\">result</a></div>"))
                    .collect()
            })
            .unwrap_or_default();

        format!(
            "<html><body>\
             <a href=\"https://accounts.google.com/ServiceLogin\">Sign in</a>\
             <div id=\"search\">{anchors}<a href=\"/search?q=next&start=10\">Next</a></div>\
             </body></html>"
        )
    }
}

#[async_trait]
impl PageFetcher for FakeGoogle {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        let parsed = Url::parse(url)?;
        match parsed.path() {
            "/" => Ok("<html><body><form action=\"/search\"></form></body></html>".into()),
            "/search" => Ok(self.results_page(&parsed)),
            other => Err(anyhow!("unexpected path {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// Fifty-word article body mentioning the URL it came from.
pub fn stub_article(url: &str) -> String {
    let mut words = vec!["Source".to_string(), format!("{url}:")];
    let filler = "the euro held firm against the dollar as traders weighed softer data \
                  and a cautious central bank";
    let filler: Vec<&str> = filler.split_whitespace().collect();
    let mut i = 0;
    while words.len() < 50 {
        words.push(filler[i % filler.len()].to_string());
        i += 1;
    }
    words.join(" ")
}

/// Returns `stub_article` for every URL except those marked as failing.
#[derive(Default)]
pub struct StubArticles {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl StubArticles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSource for StubArticles {
    async fn extract(&self, url: &str) -> ArticleText {
        self.calls.lock().unwrap().push(url.to_string());
        // Later links finish first; the analyzer must still keep link order.
        let delay = 20u64.saturating_sub(self.calls.lock().unwrap().len() as u64 * 5);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.failing.iter().any(|f| f == url) {
            ArticleText::failed(url, ExtractFailure::Timeout)
        } else {
            ArticleText::extracted(url, stub_article(url))
        }
    }
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

/// Replays one fixed answer and records every request.
pub struct ScriptedLlm {
    answer: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Completion {
            text: self.answer.clone(),
            tokens_used: 12,
            cost: 0.0,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Handles kept by a test to inspect the seams after a run.
pub struct Harness {
    pub google: Arc<FakeGoogle>,
    pub articles: Arc<StubArticles>,
    pub llm: Option<Arc<ScriptedLlm>>,
}

/// Build an analyzer over the fakes with no search pauses.
pub fn analyzer(
    google: FakeGoogle,
    articles: StubArticles,
    llm: Option<ScriptedLlm>,
) -> (SentimentAnalyzer, Harness) {
    let google = Arc::new(google);
    let articles = Arc::new(articles);
    let llm = llm.map(Arc::new);

    let search = GoogleSearch::new(
        google.clone(),
        SearchSettings {
            pause: Duration::ZERO,
            ..SearchSettings::default()
        },
    );
    let analyzer = SentimentAnalyzer::new(
        NewsLinkResolver::new(Box::new(search)),
        articles.clone(),
        llm.clone().map(|l| l as Arc<dyn LlmClient>),
        AnalyzerSettings::default(),
    )
    .unwrap();

    (analyzer, Harness { google, articles, llm })
}
