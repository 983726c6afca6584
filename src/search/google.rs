//! Google results scraping.
//!
//! `GoogleSearch::results` returns a `SearchResults` cursor. Nothing is
//! fetched until the first `next()`; each page is requested only when the
//! links from the previous page have been consumed, after a fixed pause.
//! The cursor ends when the result cap is reached or a page adds no new
//! links, and cannot be restarted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::PageFetcher;
use crate::data::LinkSearch;
use crate::types::{AnalyzerError, SearchQuery};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Page size the engine uses when `num` is omitted.
const ENGINE_PAGE_SIZE: usize = 10;

/// Query parameters that only carry click tracking.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "ved", "usg", "sa", "ei", "oq", "sca_esv"];

/// Engine-wide request settings.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub tld: String,
    pub safe: String,
    /// Results requested per page.
    pub page_size: usize,
    /// Delay before every results page request.
    pub pause: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            tld: "com".to_string(),
            safe: "off".to_string(),
            page_size: ENGINE_PAGE_SIZE,
            pause: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// Link filtering
// ---------------------------------------------------------------------------

fn is_engine_host(host: &str) -> bool {
    host.contains("google")
}

/// Turn a raw anchor href into a result link.
///
/// Redirect wrappers (`/url?q=...`) are unwrapped. Links that stay on the
/// engine's own domain, relative links and non-HTTP schemes are rejected.
pub fn filter_result(href: &str) -> Option<String> {
    let base = Url::parse("https://www.google.com/").ok()?;
    let mut url = base.join(href.trim()).ok()?;

    if url.host_str().is_some_and(is_engine_host) && url.path() == "/url" {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "q" || k == "url")
            .map(|(_, v)| v.into_owned())?;
        url = Url::parse(&target).ok()?;
    }

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().map_or(true, is_engine_host) {
        return None;
    }

    Some(normalize_url(url))
}

/// Drop the fragment and tracking parameters so equal pages compare equal.
pub fn normalize_url(mut url: Url) -> String {
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&&**k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

/// Collect anchor hrefs, preferring the `#search` results container.
fn extract_hrefs(html: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let container = Selector::parse("#search").map_err(|e| anyhow!("invalid selector: {e}"))?;
    let anchors = Selector::parse("a[href]").map_err(|e| anyhow!("invalid selector: {e}"))?;

    let hrefs = match doc.select(&container).next() {
        Some(results) => results
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect(),
        None => doc
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect(),
    };
    Ok(hrefs)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Google web/news search over a `PageFetcher`.
pub struct GoogleSearch<F> {
    fetcher: Arc<F>,
    settings: SearchSettings,
}

impl<F> Clone for GoogleSearch<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            settings: self.settings.clone(),
        }
    }
}

impl<F: PageFetcher> GoogleSearch<F> {
    pub fn new(fetcher: Arc<F>, settings: SearchSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Home page, fetched once per search to pick up session cookies.
    pub fn home_url(&self) -> String {
        format!("https://www.google.{}/", self.settings.tld)
    }

    /// Results page URL for `query`, starting at result offset `start`.
    pub fn page_url(&self, query: &SearchQuery, start: usize) -> String {
        let mut url = format!(
            "https://www.google.{}/search?hl={}&q={}&",
            self.settings.tld,
            urlencoding::encode(&query.lang),
            urlencoding::encode(&query.text),
        );

        if start == 0 {
            url.push_str("btnG=Google+Search&");
        } else {
            if self.settings.page_size != ENGINE_PAGE_SIZE {
                url.push_str(&format!("num={}&", self.settings.page_size));
            }
            url.push_str(&format!("start={start}&"));
        }

        url.push_str(&format!(
            "tbs={}&safe={}&cr={}&tbm={}",
            urlencoding::encode(&query.tbs()),
            urlencoding::encode(&self.settings.safe),
            urlencoding::encode(&query.country),
            query.tab.as_param(),
        ));

        for (k, v) in query.extra_params() {
            url.push_str(&format!("&{}={}", urlencoding::encode(k), urlencoding::encode(v)));
        }

        url
    }

    /// Lazy result cursor for `query`. No request is made until `next()`.
    pub fn results(&self, query: &SearchQuery) -> SearchResults<'_, F> {
        SearchResults::new(self, query.clone())
    }

    /// First result only ("I'm feeling lucky").
    pub async fn first_result(&self, query: &SearchQuery) -> Result<Option<String>> {
        let query = query.clone().with_cap(1);
        self.results(&query).next().await.transpose()
    }
}

#[async_trait]
impl<F: PageFetcher + 'static> LinkSearch for GoogleSearch<F> {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>> {
        self.results(query).collect_links().await
    }
}

// ---------------------------------------------------------------------------
// Result cursor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// Home page not yet fetched.
    Fresh,
    Paging,
    Done,
}

/// Single-consumer, non-restartable sequence of result links.
pub struct SearchResults<'a, F> {
    engine: &'a GoogleSearch<F>,
    query: SearchQuery,
    start: usize,
    seen: HashSet<String>,
    pending: VecDeque<String>,
    yielded: usize,
    pages: usize,
    state: CursorState,
}

impl<'a, F: PageFetcher> SearchResults<'a, F> {
    fn new(engine: &'a GoogleSearch<F>, query: SearchQuery) -> Self {
        let state = if query.result_cap == Some(0) {
            CursorState::Done
        } else {
            CursorState::Fresh
        };
        Self {
            engine,
            query,
            start: 0,
            seen: HashSet::new(),
            pending: VecDeque::new(),
            yielded: 0,
            pages: 0,
            state,
        }
    }

    /// Results pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Next result link, fetching another page if needed.
    ///
    /// Returns `None` once the sequence is exhausted. An error ends the
    /// sequence.
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(link) = self.pending.pop_front() {
                self.yielded += 1;
                if self.query.result_cap.is_some_and(|cap| self.yielded >= cap) {
                    self.finish();
                }
                return Some(Ok(link));
            }

            if self.state == CursorState::Done {
                return None;
            }

            if let Err(e) = self.fetch_next_page().await {
                self.finish();
                return Some(Err(e));
            }
        }
    }

    /// Drain the remaining links.
    pub async fn collect_links(mut self) -> Result<Vec<String>> {
        let mut links = Vec::new();
        while let Some(link) = self.next().await {
            links.push(link?);
        }
        info!(
            query = %self.query.text,
            links = links.len(),
            pages = self.pages,
            "Search complete"
        );
        Ok(links)
    }

    fn finish(&mut self) {
        self.state = CursorState::Done;
        self.pending.clear();
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        if self.state == CursorState::Fresh {
            self.engine.fetcher.fetch(&self.engine.home_url()).await?;
            self.state = CursorState::Paging;
        }

        tokio::time::sleep(self.engine.settings.pause).await;

        let url = self.engine.page_url(&self.query, self.start);
        let html = self.engine.fetcher.fetch(&url).await?;
        self.pages += 1;

        let hrefs = extract_hrefs(&html)?;
        if hrefs.is_empty() {
            return Err(AnalyzerError::UnparseableResults(url).into());
        }

        let mut fresh = 0usize;
        for link in hrefs.iter().filter_map(|h| filter_result(h)) {
            if self.seen.insert(link.clone()) {
                self.pending.push_back(link);
                fresh += 1;
            }
        }

        debug!(
            query = %self.query.text,
            start = self.start,
            anchors = hrefs.len(),
            new_links = fresh,
            "Results page parsed"
        );

        if fresh == 0 {
            self.state = CursorState::Done;
        }
        self.start += self.engine.settings.page_size;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
