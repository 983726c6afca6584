//! Shared types for the asset sentiment pipeline.
//!
//! Search queries, resolved link sets, extracted articles, prompt
//! documents and sentiment labels. Every other module depends on these,
//! so they carry no I/O of their own.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Format used for user-facing dates and the engine's date filter.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Parse a target date given as `MM/DD/YYYY` or the literal `today`.
pub fn parse_date(input: &str) -> Result<NaiveDate, AnalyzerError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("today") {
        return Ok(today());
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| AnalyzerError::InvalidDate(trimmed.to_string()))
}

/// Today's date on the process clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Reject dates that lie after today.
pub fn ensure_not_future(date: NaiveDate) -> Result<NaiveDate, AnalyzerError> {
    if date > today() {
        return Err(AnalyzerError::FutureDate(date));
    }
    Ok(date)
}

// ---------------------------------------------------------------------------
// Search query
// ---------------------------------------------------------------------------

/// GET parameters the search URL templates already set.
pub const RESERVED_PARAMS: &[&str] = &["hl", "q", "num", "btnG", "start", "tbs", "safe", "cr", "tbm"];

/// Result tab on the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchTab {
    #[default]
    All,
    News,
}

impl SearchTab {
    /// Value of the `tbm` parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            SearchTab::All => "",
            SearchTab::News => "nws",
        }
    }
}

/// A single search request.
///
/// The date restriction is checked when it is attached, so a query that
/// exists never targets a future date.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub lang: String,
    pub country: String,
    date: Option<NaiveDate>,
    pub tab: SearchTab,
    pub result_cap: Option<usize>,
    extra_params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: "en".to_string(),
            country: String::new(),
            date: None,
            tab: SearchTab::All,
            result_cap: None,
            extra_params: Vec::new(),
        }
    }

    pub fn news(mut self) -> Self {
        self.tab = SearchTab::News;
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.result_cap = Some(cap);
        self
    }

    pub fn in_language(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn in_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Restrict results to a single calendar day. Fails on future dates.
    pub fn on_date(mut self, date: NaiveDate) -> Result<Self, AnalyzerError> {
        self.date = Some(ensure_not_future(date)?);
        Ok(self)
    }

    /// Append an extra GET parameter. Built-in parameter names are rejected.
    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, AnalyzerError> {
        let key = key.into();
        if RESERVED_PARAMS.contains(&key.as_str()) {
            return Err(AnalyzerError::ReservedParam(key));
        }
        self.extra_params.push((key, value.into()));
        Ok(self)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn extra_params(&self) -> &[(String, String)] {
        &self.extra_params
    }

    /// The `tbs` date-range filter string.
    pub fn tbs(&self) -> String {
        match self.date {
            Some(d) => {
                let day = d.format(DATE_FORMAT);
                format!("cdr:1,cd_min:{day},cd_max:{day}")
            }
            None => "0".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Link count
// ---------------------------------------------------------------------------

/// Number of news links to resolve. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct LinkCount(usize);

impl LinkCount {
    pub const DEFAULT: LinkCount = LinkCount(4);

    pub fn new(count: usize) -> Result<Self, AnalyzerError> {
        if count == 0 {
            return Err(AnalyzerError::InvalidCount("0".to_string()));
        }
        Ok(Self(count))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for LinkCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for LinkCount {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: usize = s
            .trim()
            .parse()
            .map_err(|_| AnalyzerError::InvalidCount(s.to_string()))?;
        Self::new(n)
    }
}

impl TryFrom<usize> for LinkCount {
    type Error = AnalyzerError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LinkCount> for usize {
    fn from(value: LinkCount) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// News links
// ---------------------------------------------------------------------------

/// Links resolved for one asset on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsLinkSet {
    pub asset: String,
    pub date: Option<NaiveDate>,
    pub links: Vec<String>,
    /// Link count the set was resolved for.
    pub target: LinkCount,
}

impl NewsLinkSet {
    pub fn matches(&self, asset: &str, date: Option<NaiveDate>) -> bool {
        self.asset == asset && self.date == date
    }

    /// Whether this set answers a request for `target` links. A short set
    /// means the search was exhausted, so it answers any larger target too.
    pub fn covers(&self, target: LinkCount) -> bool {
        target <= self.target || self.links.len() < self.target.get()
    }
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// Why an article could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractFailure {
    Timeout,
    Connect(String),
    Status(u16),
    NonText(String),
    Body(String),
    Request(String),
}

impl fmt::Display for ExtractFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractFailure::Timeout => write!(f, "request timed out"),
            ExtractFailure::Connect(e) => write!(f, "connection failed: {e}"),
            ExtractFailure::Status(code) => write!(f, "HTTP {code}"),
            ExtractFailure::NonText(ct) => write!(f, "non-text payload: {ct}"),
            ExtractFailure::Body(e) => write!(f, "failed to read body: {e}"),
            ExtractFailure::Request(e) => write!(f, "request error: {e}"),
        }
    }
}

/// Outcome of reading one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleBody {
    /// Page was read. The text may still be empty if the page had no content.
    Extracted(String),
    Unavailable(ExtractFailure),
}

/// Extracted text of one news link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText {
    pub url: String,
    pub body: ArticleBody,
}

impl ArticleText {
    pub fn extracted(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: ArticleBody::Extracted(text.into()),
        }
    }

    pub fn failed(url: impl Into<String>, reason: ExtractFailure) -> Self {
        Self {
            url: url.into(),
            body: ArticleBody::Unavailable(reason),
        }
    }

    /// Text to place in the prompt. Failed extractions read as empty.
    pub fn text(&self) -> &str {
        match &self.body {
            ArticleBody::Extracted(text) => text,
            ArticleBody::Unavailable(_) => "",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.body, ArticleBody::Unavailable(_))
    }
}

// ---------------------------------------------------------------------------
// Prompt document
// ---------------------------------------------------------------------------

/// Labelled concatenation of article texts sent to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptDocument(String);

impl PromptDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PromptDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Bullish,
        SentimentLabel::Bearish,
        SentimentLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "bullish",
            SentimentLabel::Bearish => "bearish",
            SentimentLabel::Neutral => "neutral",
        }
    }

    /// Match a lower-cased model answer against the closed label set.
    pub fn from_answer(answer: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == answer)
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a sentiment classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentimentVerdict {
    Label(SentimentLabel),
    /// The model answered outside the label set. Holds the lower-cased answer.
    Drift(String),
}

impl SentimentVerdict {
    /// Normalise a raw model answer: trim, strip quotes/punctuation, lower-case.
    pub fn from_answer(raw: &str) -> Self {
        let answer = raw
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match SentimentLabel::from_answer(&answer) {
            Some(label) => SentimentVerdict::Label(label),
            None => SentimentVerdict::Drift(answer),
        }
    }

    pub fn label(&self) -> Option<SentimentLabel> {
        match self {
            SentimentVerdict::Label(l) => Some(*l),
            SentimentVerdict::Drift(_) => None,
        }
    }

    pub fn is_drift(&self) -> bool {
        matches!(self, SentimentVerdict::Drift(_))
    }
}

impl fmt::Display for SentimentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentVerdict::Label(l) => write!(f, "{l}"),
            SentimentVerdict::Drift(raw) => write!(f, "unclassified ({raw:?})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Precondition and search failures surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    #[error("No LLM API key configured")]
    MissingCredential,

    #[error("Invalid link count {0:?}: expected a positive integer")]
    InvalidCount(String),

    #[error("Date {0} is in the future")]
    FutureDate(NaiveDate),

    #[error("Date {0:?} does not match format MM/DD/YYYY")]
    InvalidDate(String),

    #[error("GET parameter {0:?} overlaps a built-in search parameter")]
    ReservedParam(String),

    #[error("Search results page has no parseable links: {0}")]
    UnparseableResults(String),

    #[error("Search engine returned HTTP {status} for {url}")]
    SearchStatus { status: u16, url: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
