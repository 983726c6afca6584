//! News data providers.
//!
//! Defines the two seams the analysis pipeline reads news through:
//! `LinkSearch` finds article links for a query and `ArticleSource` turns
//! one link into article text.

pub mod extractor;
pub mod news;
pub mod readability;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ArticleText, SearchQuery};

/// Abstraction over a web search backend.
#[async_trait]
pub trait LinkSearch: Send + Sync {
    /// Result links for `query`, in discovery order, at most
    /// `query.result_cap` of them.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>>;
}

/// Abstraction over article fetching and extraction.
///
/// Implementations never fail: an unreadable page comes back as an
/// `ArticleText` whose body records the failure.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn extract(&self, url: &str) -> ArticleText;
}
