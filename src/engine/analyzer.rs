//! Sentiment and report service.
//!
//! Ties the pipeline together: resolve news links for an asset and date,
//! extract every article concurrently, assemble a labelled document, cut it
//! to the token budget, then ask the model for either a one-word sentiment
//! or a short report.

use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::prompt::{PromptAssembler, DEFAULT_MAX_PROMPT_TOKENS};
use crate::data::news::NewsLinkResolver;
use crate::data::ArticleSource;
use crate::llm::{openai, CompletionRequest, LlmClient};
use crate::types::{AnalyzerError, ArticleText, LinkCount, PromptDocument, SentimentVerdict};

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const SENTIMENT_SYSTEM: &str = "You will be given financial and technical analysis write-ups, \
news stories or opinion pieces. From this content, decide whether the asset the user asks about \
has an overall bullish, bearish or neutral sentiment. Follow the user's instructions exactly.";

fn sentiment_prompt(asset: &str, news: &PromptDocument) -> String {
    format!(
        "Drawing on your knowledge of financial markets and textual analysis, weigh the \
         information in the articles below and decide whether the sentiment for {asset} is \
         mainly bullish, bearish, or neutral:\n{news}\n\
         Answer with exactly one lower-case word (\"bullish\", \"bearish\", or \"neutral\") \
         and nothing else."
    )
}

fn report_prompt(asset: &str, news: &PromptDocument, max_words: u32) -> String {
    format!(
        "Write a short, impactful report with the key insights for {asset} from the \
         following information:\n{news}\n\
         The report must be no longer than {max_words} words."
    )
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Model fields left as `None` send no override, so the client's own
/// default model answers.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub link_count: LinkCount,
    pub max_prompt_tokens: usize,
    pub sentiment_model: Option<String>,
    pub sentiment_max_tokens: u32,
    pub report_model: Option<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            link_count: LinkCount::DEFAULT,
            max_prompt_tokens: DEFAULT_MAX_PROMPT_TOKENS,
            sentiment_model: None,
            sentiment_max_tokens: 5,
            report_model: Some(openai::REPORT_MODEL.to_string()),
        }
    }
}

pub struct SentimentAnalyzer {
    resolver: NewsLinkResolver,
    articles: Arc<dyn ArticleSource>,
    assembler: PromptAssembler,
    llm: Option<Arc<dyn LlmClient>>,
    settings: AnalyzerSettings,
}

impl SentimentAnalyzer {
    /// `llm` may be absent; link and article lookups still work, while
    /// reports and sentiment fail with `MissingCredential`.
    pub fn new(
        resolver: NewsLinkResolver,
        articles: Arc<dyn ArticleSource>,
        llm: Option<Arc<dyn LlmClient>>,
        settings: AnalyzerSettings,
    ) -> Result<Self> {
        Ok(Self {
            resolver,
            articles,
            assembler: PromptAssembler::new()?,
            llm,
            settings,
        })
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &NewsLinkResolver {
        &self.resolver
    }

    /// News links for `asset` on `date`, at most `link_count` of them.
    pub async fn fetch_news_links(
        &mut self,
        asset: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<String>> {
        self.resolver.resolve(asset, date, self.settings.link_count).await
    }

    /// Extract a single page.
    pub async fn show_news_content(&self, url: &str) -> ArticleText {
        self.articles.extract(url).await
    }

    /// Extract all links concurrently; results keep link order.
    pub async fn gather_articles(&self, links: &[String]) -> Vec<ArticleText> {
        let articles = join_all(links.iter().map(|url| self.articles.extract(url))).await;
        let failed = articles.iter().filter(|a| a.is_failure()).count();
        if failed > 0 {
            warn!(failed, total = articles.len(), "Some articles could not be extracted");
        }
        articles
    }

    /// Resolve, extract, assemble and truncate the article document.
    pub async fn build_document(
        &mut self,
        asset: &str,
        date: Option<NaiveDate>,
    ) -> Result<PromptDocument> {
        let links = self.fetch_news_links(asset, date).await?;
        if links.is_empty() {
            warn!(asset, ?date, "No news links found, prompting with an empty document");
        }

        let articles = self.gather_articles(&links).await;
        let doc = self.assembler.assemble(&articles);
        let doc = self.assembler.truncate(doc, self.settings.max_prompt_tokens);
        debug!(asset, articles = articles.len(), chars = doc.as_str().len(), "Document assembled");
        Ok(doc)
    }

    /// A narrative report of at most `max_words` words, returned verbatim.
    pub async fn produce_report(
        &mut self,
        asset: &str,
        date: Option<NaiveDate>,
        max_words: u32,
    ) -> Result<String> {
        let llm = self.require_llm()?;
        let doc = self.build_document(asset, date).await?;

        let mut request = CompletionRequest::new(report_prompt(asset, &doc, max_words));
        if let Some(model) = &self.settings.report_model {
            request = request.with_model(model.as_str());
        }
        let completion = llm.complete(&request).await?;

        info!(asset, ?date, tokens = completion.tokens_used, cost = completion.cost, "Report produced");
        Ok(completion.text)
    }

    /// One of bullish, bearish or neutral, or the raw answer as drift.
    pub async fn get_sentiment(
        &mut self,
        asset: &str,
        date: Option<NaiveDate>,
    ) -> Result<SentimentVerdict> {
        let llm = self.require_llm()?;
        let doc = self.build_document(asset, date).await?;

        let mut request = CompletionRequest::new(sentiment_prompt(asset, &doc))
            .with_system(SENTIMENT_SYSTEM)
            .with_max_output_tokens(self.settings.sentiment_max_tokens);
        if let Some(model) = &self.settings.sentiment_model {
            request = request.with_model(model.as_str());
        }
        let completion = llm.complete(&request).await?;

        let verdict = SentimentVerdict::from_answer(&completion.text);
        match &verdict {
            SentimentVerdict::Label(label) => {
                info!(asset, ?date, sentiment = %label, "Sentiment classified");
            }
            SentimentVerdict::Drift(raw) => {
                warn!(asset, ?date, answer = %raw, "Sentiment answer outside the label set");
            }
        }
        Ok(verdict)
    }

    fn require_llm(&self) -> Result<Arc<dyn LlmClient>> {
        match &self.llm {
            Some(llm) => Ok(llm.clone()),
            None => Err(AnalyzerError::MissingCredential.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
