//! End-to-end pipeline scenarios.

use chrono::{Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use tokio_test::{assert_err, assert_ok};
use url::Url;

use asset_sentiment::types::{parse_date, today, AnalyzerError, SentimentLabel, SentimentVerdict};

use crate::mocks::{analyzer, stub_article, FakeGoogle, ScriptedLlm, StubArticles};

const EURUSD_LINKS: [&str; 4] = [
    "https://www.fxstreet.com/news/eurusd-forecast-0606",
    "https://www.dailyfx.com/eur-usd/outlook",
    "https://www.investing.com/analysis/eurusd-ecb-200650123",
    "https://www.fxempire.com/forecasts/article/eur-usd-ecb-1440000",
];

/// Result page as the engine renders it: redirect wrappers, tracking
/// parameters, fragments, an engine-internal link and a duplicate.
fn eurusd_google() -> FakeGoogle {
    FakeGoogle::new().with_results(
        "EURUSD technical analysis",
        &[
            "/url?q=https://www.fxstreet.com/news/eurusd-forecast-0606&amp;sa=U&amp;ved=2ahUKE",
            "https://www.dailyfx.com/eur-usd/outlook?utm_source=google&amp;utm_medium=news",
            "https://www.google.com/finance/quote/EUR-USD",
            "https://www.investing.com/analysis/eurusd-ecb-200650123#comments",
            "https://www.dailyfx.com/eur-usd/outlook",
            "https://www.fxempire.com/forecasts/article/eur-usd-ecb-1440000",
            "https://www.fxstreet.com/news/another-story",
        ],
    )
}

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn query_params(url: &str) -> HashMap<String, String> {
    Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

#[tokio::test]
async fn test_eurusd_end_to_end() {
    let (mut analyzer, h) = analyzer(
        eurusd_google(),
        StubArticles::new(),
        Some(ScriptedLlm::answering("Bearish\n")),
    );
    let date = parse_date("06/06/2024").unwrap();

    let links = assert_ok!(analyzer.fetch_news_links("EURUSD", Some(date)).await);
    assert_eq!(links, EURUSD_LINKS);

    let doc = assert_ok!(analyzer.build_document("EURUSD", Some(date)).await);
    assert_eq!(doc.as_str().matches("Article ").count(), 4);
    let mut last = 0;
    for (i, link) in EURUSD_LINKS.iter().enumerate() {
        let block = format!("Article {}:\n\"{}\"", i + 1, stub_article(link));
        let at = doc.as_str().find(&block).unwrap();
        assert!(i == 0 || at > last);
        last = at;
    }

    let verdict = assert_ok!(analyzer.get_sentiment("EURUSD", Some(date)).await);
    assert_eq!(verdict, SentimentVerdict::Label(SentimentLabel::Bearish));
    assert!(SentimentLabel::ALL.contains(&verdict.label().unwrap()));

    let llm = h.llm.unwrap();
    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains(doc.as_str()));
    assert_eq!(requests[0].max_output_tokens, Some(5));
    assert!(requests[0].system.is_some());

    // One home page and one results page; everything after came from cache.
    let fetched = h.google.requests();
    assert_eq!(fetched.len(), 2);
    let params = query_params(&fetched[1]);
    assert_eq!(params["q"], "EURUSD technical analysis");
    assert_eq!(params["tbm"], "nws");
    assert_eq!(params["tbs"], "cdr:1,cd_min:06/06/2024,cd_max:06/06/2024");
    assert_eq!(params["hl"], "en");
}

#[tokio::test]
async fn test_articles_extracted_concurrently_in_link_order() {
    let (mut analyzer, h) = analyzer(eurusd_google(), StubArticles::new(), None);
    let links = assert_ok!(analyzer.fetch_news_links("EURUSD", Some(june(6))).await);

    let articles = analyzer.gather_articles(&links).await;

    let urls: Vec<_> = articles.iter().map(|a| a.url.clone()).collect();
    assert_eq!(urls, links);
    assert_eq!(h.articles.calls(), links);
    assert!(articles.iter().all(|a| a.text().split_whitespace().count() == 50));
}

#[tokio::test]
async fn test_failed_article_keeps_its_slot() {
    let (mut analyzer, _h) = analyzer(
        eurusd_google(),
        StubArticles::new().failing(EURUSD_LINKS[1]),
        Some(ScriptedLlm::answering("neutral")),
    );

    let doc = assert_ok!(analyzer.build_document("EURUSD", Some(june(6))).await);
    assert!(doc.as_str().contains("Article 2:\n\"\"\n"));
    assert_eq!(doc.as_str().matches("Article ").count(), 4);

    let verdict = assert_ok!(analyzer.get_sentiment("EURUSD", Some(june(6))).await);
    assert_eq!(verdict.label(), Some(SentimentLabel::Neutral));
}

#[tokio::test]
async fn test_same_date_reuses_links_new_date_searches_again() {
    let (mut analyzer, h) = analyzer(eurusd_google(), StubArticles::new(), None);

    let first = assert_ok!(analyzer.fetch_news_links("EURUSD", Some(june(6))).await);
    let after_first = h.google.request_count();
    let again = assert_ok!(analyzer.fetch_news_links("EURUSD", Some(june(6))).await);
    assert_eq!(first, again);
    assert_eq!(h.google.request_count(), after_first);

    assert_ok!(analyzer.fetch_news_links("EURUSD", Some(june(5))).await);
    assert!(h.google.request_count() > after_first);

    let last = h.google.requests().pop().unwrap();
    assert_eq!(
        query_params(&last)["tbs"],
        "cdr:1,cd_min:06/05/2024,cd_max:06/05/2024"
    );
}

#[tokio::test]
async fn test_links_bounded_and_distinct() {
    let google = FakeGoogle::new()
        .with_results(
            "GC=F technical analysis",
            &["https://www.kitco.com/news/gold-1", "https://www.kitco.com/news/gold-1?utm_campaign=x"],
        )
        .with_results(
            "GC=F price sentiment",
            &["https://www.kitco.com/news/gold-1", "https://www.reuters.com/markets/gold-2"],
        )
        .with_results(
            "GC=F trading signal",
            &["https://www.fxstreet.com/gold-3#top", "https://www.fxstreet.com/gold-4"],
        )
        .with_results("GC=F", &["https://www.bloomberg.com/gold-5"]);
    let (mut analyzer, _h) = analyzer(google, StubArticles::new(), None);

    let links = assert_ok!(analyzer.fetch_news_links("GC=F", Some(june(6))).await);

    assert_eq!(
        links,
        vec![
            "https://www.kitco.com/news/gold-1",
            "https://www.reuters.com/markets/gold-2",
            "https://www.fxstreet.com/gold-3",
            "https://www.fxstreet.com/gold-4",
        ]
    );
    let distinct: HashSet<_> = links.iter().collect();
    assert_eq!(distinct.len(), links.len());
}

#[tokio::test]
async fn test_no_links_still_sends_degenerate_prompt() {
    let (mut analyzer, h) = analyzer(
        FakeGoogle::new(),
        StubArticles::new(),
        Some(ScriptedLlm::answering("neutral")),
    );

    let links = assert_ok!(analyzer.fetch_news_links("CC=F", None).await);
    assert!(links.is_empty());

    let doc = assert_ok!(analyzer.build_document("CC=F", None).await);
    assert_eq!(doc.as_str(), "");

    let verdict = assert_ok!(analyzer.get_sentiment("CC=F", None).await);
    assert_eq!(verdict.label(), Some(SentimentLabel::Neutral));

    let requests = h.llm.unwrap().requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].prompt.contains("Article "));
    assert!(h.articles.calls().is_empty());
}

#[tokio::test]
async fn test_future_date_rejected_before_any_request() {
    let (mut analyzer, h) = analyzer(
        eurusd_google(),
        StubArticles::new(),
        Some(ScriptedLlm::answering("bullish")),
    );
    let tomorrow = today() + Duration::days(1);

    let err = assert_err!(analyzer.get_sentiment("EURUSD", Some(tomorrow)).await);
    assert_eq!(err.downcast_ref::<AnalyzerError>(), Some(&AnalyzerError::FutureDate(tomorrow)));
    assert_eq!(h.google.request_count(), 0);
    assert!(h.llm.unwrap().requests().is_empty());
}

#[tokio::test]
async fn test_missing_credential_rejected_before_any_request() {
    let (mut analyzer, h) = analyzer(eurusd_google(), StubArticles::new(), None);

    let err = assert_err!(analyzer.produce_report("EURUSD", Some(june(6)), 100).await);
    assert_eq!(err.downcast_ref::<AnalyzerError>(), Some(&AnalyzerError::MissingCredential));
    assert_eq!(h.google.request_count(), 0);
    assert!(h.articles.calls().is_empty());
}

#[tokio::test]
async fn test_unparseable_results_page_is_fatal() {
    let (mut analyzer, h) = analyzer(
        FakeGoogle::new().with_broken_page("EURUSD technical analysis"),
        StubArticles::new(),
        Some(ScriptedLlm::answering("bullish")),
    );

    let err = assert_err!(analyzer.get_sentiment("EURUSD", Some(june(6))).await);
    assert!(matches!(
        err.downcast_ref::<AnalyzerError>(),
        Some(AnalyzerError::UnparseableResults(_))
    ));
    assert!(h.llm.unwrap().requests().is_empty());
}

#[tokio::test]
async fn test_drift_reported_not_raised() {
    let (mut analyzer, _h) = analyzer(
        eurusd_google(),
        StubArticles::new(),
        Some(ScriptedLlm::answering("Slightly bullish")),
    );

    let verdict = assert_ok!(analyzer.get_sentiment("EURUSD", Some(june(6))).await);
    assert!(verdict.is_drift());
    assert_eq!(verdict.label(), None);
}

#[tokio::test]
async fn test_report_returned_verbatim() {
    let report = "EUR/USD held above 1.08 as markets priced an ECB cut.\nBias: mildly bullish.";
    let (mut analyzer, h) = analyzer(
        eurusd_google(),
        StubArticles::new(),
        Some(ScriptedLlm::answering(report)),
    );

    let text = assert_ok!(analyzer.produce_report("EURUSD", Some(june(6)), 60).await);
    assert_eq!(text, report);

    let requests = h.llm.unwrap().requests();
    assert_eq!(requests[0].model.as_deref(), Some("gpt-4o"));
    assert!(requests[0].prompt.contains("60 words"));
    assert!(requests[0].prompt.contains("Article 4:"));
}
