//! News link resolution for an asset.
//!
//! Searches the news tab with progressively broader query variants until
//! enough distinct links are found, then remembers the result for the
//! most recently requested date so repeat requests skip the network.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use super::LinkSearch;
use crate::types::{LinkCount, NewsLinkSet, SearchQuery};

// ---------------------------------------------------------------------------
// Query variants
// ---------------------------------------------------------------------------

/// Query suffixes, most specific first. The empty suffix is the bare asset.
const QUERY_SUFFIXES: &[&str] = &["technical analysis", "price sentiment", "trading signal", ""];

/// Results requested per query variant.
const DEFAULT_BATCH_SIZE: usize = 4;

/// Query strings for `asset`, most specific first.
pub fn query_variants(asset: &str) -> Vec<String> {
    QUERY_SUFFIXES
        .iter()
        .map(|suffix| {
            if suffix.is_empty() {
                asset.to_string()
            } else {
                format!("{asset} {suffix}")
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves news links through a `LinkSearch` backend, caching one date.
pub struct NewsLinkResolver {
    search: Box<dyn LinkSearch>,
    batch_size: usize,
    lang: String,
    country: String,
    cache: Option<NewsLinkSet>,
    searches: u64,
    cache_hits: u64,
}

impl NewsLinkResolver {
    pub fn new(search: Box<dyn LinkSearch>) -> Self {
        Self {
            search,
            batch_size: DEFAULT_BATCH_SIZE,
            lang: "en".to_string(),
            country: String::new(),
            cache: None,
            searches: 0,
            cache_hits: 0,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_locale(mut self, lang: impl Into<String>, country: impl Into<String>) -> Self {
        self.lang = lang.into();
        self.country = country.into();
        self
    }

    /// Search calls made so far.
    pub fn searches(&self) -> u64 {
        self.searches
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// The currently cached link set, if any.
    pub fn cached(&self) -> Option<&NewsLinkSet> {
        self.cache.as_ref()
    }

    /// Resolve up to `target` distinct news links for `asset` on `date`.
    ///
    /// A repeat request for the cached asset and date returns the cached
    /// links, unless it asks for more than a full cached set holds. Finding
    /// fewer links than requested is not an error.
    pub async fn resolve(
        &mut self,
        asset: &str,
        date: Option<NaiveDate>,
        target: LinkCount,
    ) -> Result<Vec<String>> {
        if let Some(cached) = self
            .cache
            .as_ref()
            .filter(|c| c.matches(asset, date) && c.covers(target))
        {
            self.cache_hits += 1;
            debug!(asset, ?date, links = cached.links.len(), "News links cache hit");
            return Ok(cached.links.iter().take(target.get()).cloned().collect());
        }

        let wanted = target;
        let target = target.get();
        let mut links: Vec<String> = Vec::with_capacity(target);

        for text in query_variants(asset) {
            if links.len() >= target {
                break;
            }

            let mut query = SearchQuery::new(text)
                .news()
                .with_cap(self.batch_size)
                .in_language(self.lang.as_str())
                .in_country(self.country.as_str());
            if let Some(day) = date {
                query = query.on_date(day)?;
            }

            let found = self.search.search(&query).await?;
            self.searches += 1;
            debug!(query = %query.text, found = found.len(), "Query variant searched");

            for link in found {
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }

        links.truncate(target);
        info!(asset, ?date, links = links.len(), "News links resolved");

        self.cache = Some(NewsLinkSet {
            asset: asset.to_string(),
            date,
            links: links.clone(),
            target: wanted,
        });
        Ok(links)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
