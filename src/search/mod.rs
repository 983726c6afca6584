//! Web search without an API.
//!
//! Scrapes the search engine's HTML results pages through a cookie-carrying
//! session. `google` builds the request URLs and turns pages into a lazy
//! sequence of result links; `session` owns the HTTP client and cookie jar.

pub mod google;
pub mod session;

use anyhow::Result;
use async_trait::async_trait;

/// Fetches a page body as text.
///
/// The search engine is reached only through this trait, so result
/// parsing and pagination can be driven from canned pages in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
