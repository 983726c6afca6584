//! asset-sentiment: news-driven sentiment and reports for FX pairs and commodities.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the search session, article extractor and LLM client together,
//! then runs every requested asset and date through the analyzer.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use asset_sentiment::config::AppConfig;
use asset_sentiment::data::extractor::WebExtractor;
use asset_sentiment::data::news::NewsLinkResolver;
use asset_sentiment::engine::analyzer::SentimentAnalyzer;
use asset_sentiment::llm::{self, LlmClient};
use asset_sentiment::search::google::GoogleSearch;
use asset_sentiment::search::session::SearchSession;
use asset_sentiment::types::{ensure_not_future, parse_date, today, AnalyzerError, LinkCount, DATE_FORMAT};

#[derive(Debug, Parser)]
#[command(name = "asset-sentiment", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Asset to analyse; repeatable. Defaults to the whole watchlist.
    #[arg(long = "asset")]
    assets: Vec<String>,

    /// News date as MM/DD/YYYY or "today"; repeatable.
    #[arg(long = "date")]
    dates: Vec<String>,

    /// Write a short report instead of a one-word sentiment.
    #[arg(long)]
    report: bool,

    /// Word limit for reports.
    #[arg(long)]
    max_words: Option<u32>,

    /// Number of news links to resolve per asset and date.
    #[arg(long)]
    links: Option<LinkCount>,

    /// Only print the resolved links; no LLM calls.
    #[arg(long)]
    links_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let mut cfg = if Path::new(&cli.config).exists() {
        AppConfig::load(&cli.config)?
    } else {
        warn!(path = %cli.config, "Config file not found, using defaults");
        AppConfig::default()
    };
    if let Some(links) = cli.links {
        cfg.analyzer.link_count = links;
    }

    // Validate every input before any network activity.
    let dates = resolve_dates(&cli.dates)?;
    let assets = if cli.assets.is_empty() {
        cfg.watchlist.all()
    } else {
        cli.assets.clone()
    };

    let llm_client = if cli.links_only {
        None
    } else {
        Some(build_llm(&cfg)?)
    };

    // -- Initialise components -------------------------------------------

    let mut session = SearchSession::open(cfg.cookie_jar_path(), cfg.search.verify_ssl)?;
    if let Some(agent) = &cfg.search.user_agent {
        session = session.with_user_agent(agent.clone());
    }
    let search = GoogleSearch::new(Arc::new(session), cfg.search_settings());
    let resolver = NewsLinkResolver::new(Box::new(search))
        .with_batch_size(cfg.search.batch_size)
        .with_locale(cfg.search.lang.clone(), cfg.search.country.clone());
    let extractor = Arc::new(WebExtractor::new(cfg.extractor_settings()));

    let mut analyzer =
        SentimentAnalyzer::new(resolver, extractor, llm_client, cfg.analyzer_settings())?;

    let mode = if cli.links_only {
        "links"
    } else if cli.report {
        "report"
    } else {
        "sentiment"
    };
    info!(
        assets = assets.len(),
        dates = dates.len(),
        links = cfg.analyzer.link_count.get(),
        mode,
        "asset-sentiment starting"
    );

    // -- Main loop -------------------------------------------------------

    let max_words = cli.max_words.unwrap_or(cfg.analyzer.report_max_words);
    let mut failures = 0usize;

    for date in &dates {
        for asset in &assets {
            let label = date.format(DATE_FORMAT).to_string();
            let outcome = if cli.links_only {
                analyzer
                    .fetch_news_links(asset, Some(*date))
                    .await
                    .map(|links| links.join("\n"))
            } else if cli.report {
                analyzer.produce_report(asset, Some(*date), max_words).await
            } else {
                analyzer
                    .get_sentiment(asset, Some(*date))
                    .await
                    .map(|verdict| verdict.to_string())
            };

            match outcome {
                Ok(text) => println!("{asset} {label}: {text}"),
                Err(e) => {
                    failures += 1;
                    error!(asset = %asset, date = %label, error = %e, "Analysis failed, continuing");
                }
            }
        }
    }

    info!(
        runs = assets.len() * dates.len(),
        failures,
        searches = analyzer.resolver().searches(),
        cache_hits = analyzer.resolver().cache_hits(),
        "asset-sentiment finished"
    );

    Ok(())
}

/// Parse the requested dates, defaulting to today, rejecting future ones.
fn resolve_dates(raw: &[String]) -> Result<Vec<NaiveDate>> {
    if raw.is_empty() {
        return Ok(vec![today()]);
    }
    raw.iter()
        .map(|s| -> Result<NaiveDate> {
            let date = parse_date(s)?;
            Ok(ensure_not_future(date)?)
        })
        .collect()
}

/// Build the configured LLM client; a missing key stops the run up front.
fn build_llm(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let key = llm::resolve_api_key(&cfg.llm);
    let client = llm::build_client(&cfg.llm, key).map_err(|e| {
        if e.downcast_ref::<AnalyzerError>() == Some(&AnalyzerError::MissingCredential) {
            error!(env = %cfg.llm.api_key_env, "LLM API key not set");
        }
        e
    })?;
    info!(provider = %cfg.llm.provider, model = client.model_name(), "LLM client ready");
    Ok(client)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("asset_sentiment=info"));

    if std::env::var("ASSET_SENTIMENT_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
