//! # DACH Cyber News
//!
//! Collects cybersecurity news for Germany, Austria and Switzerland from a
//! news index, scrapes the full article text, lets a language model decide
//! which articles are relevant, and writes an analyst report.
//!
//! ## Usage
//!
//! ```sh
//! NEWS_API_KEY=... OPENAI_API_KEY=... dach_cyber_news --days 7 --pdf
//! ```
//!
//! ## Architecture
//!
//! The run is a strictly sequential pipeline:
//! 1. **Fetching**: top headlines per country plus a full-text search
//! 2. **Deduplication**: canonical articles, unique by URL, newest first; snapshot
//! 3. **Scraping**: full text per article, with courtesy delays and retries
//! 4. **Classification**: one model call per article; relevant subset snapshot
//! 5. **Report**: one model call over the top 30 articles; markdown (and PDF)

use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod classifier;
mod cli;
mod config;
mod content;
mod error;
mod models;
mod news_api;
mod outputs;
mod processor;
mod report;
mod utils;

use api::{OpenAiChat, RetryAsk, chat_client};
use classifier::Classifier;
use cli::Cli;
use config::{Config, FileConfig};
use content::{ArticleScraper, HttpPageFetcher, Pacing};
use models::Country;
use news_api::NewsApiClient;
use utils::ensure_writable_dir;

/// Lines of the report echoed to the log after saving.
const PREVIEW_LINES: usize = 15;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("dach_cyber_news starting up");

    // .env feeds the env fallbacks of the CLI
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env");
    }
    let args = Cli::parse();
    debug!(
        days = ?args.days,
        output = ?args.output,
        max_scrape = ?args.max_scrape,
        "Parsed CLI arguments"
    );

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path).await?,
        None => FileConfig::default(),
    };
    let config = Config::resolve(&args, file_config);
    probe_output_dirs(&config, &args).await?;

    let report_input = if args.report_only {
        args.input.clone()
    } else {
        let snapshot = run_scraper(&config, &args).await?;
        match snapshot {
            Some(path) => Some(path),
            None => {
                info!("No articles found matching the criteria");
                None
            }
        }
    };

    if !args.no_report && (args.report_only || report_input.is_some()) {
        run_report_generator(&config, &args, report_input).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Directories this run will write into.
fn output_dirs<'a>(config: &'a Config, args: &Cli) -> Vec<&'a Path> {
    let mut dirs = Vec::new();
    if !args.report_only {
        dirs.push(config.output_dir.as_path());
    }
    if !args.no_report {
        dirs.push(config.report_dir.as_path());
    }
    dirs
}

/// Fail before any network work if an output directory is not writable.
async fn probe_output_dirs(config: &Config, args: &Cli) -> error::Result<()> {
    for dir in output_dirs(config, args) {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }
    Ok(())
}

fn llm_client(config: &Config) -> Option<RetryAsk<OpenAiChat>> {
    config
        .openai_api_key
        .as_deref()
        .map(|key| chat_client(key, config.openai_base_url.as_deref()))
}

/// Fetch, deduplicate, scrape and classify.
///
/// # Returns
///
/// The snapshot the report should read: the relevant subset when one was
/// written, otherwise the deduplicated set. `None` when nothing was found.
#[instrument(level = "info", skip_all, fields(days_back = config.days_back))]
async fn run_scraper(config: &Config, args: &Cli) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let api_key = match config.require_news_api_key() {
        Ok(key) => key,
        Err(e) => {
            error!(error = %e, "NEWS_API_KEY not found; set it in the environment or a .env file");
            return Err(e.into());
        }
    };

    info!(days_back = config.days_back, "Searching for cybersecurity news from the DACH region");
    let source = NewsApiClient::new(api_key).with_base_url(&config.news_api_base_url);
    let raw =
        news_api::fetch_all_cybersecurity_news(&source, &Country::DACH, config.days_back).await;

    let articles = processor::process_articles(raw);
    if articles.is_empty() {
        return Ok(None);
    }

    let saved = processor::save_articles(&articles, &config.output_dir).await?;
    if let Some(path) = &saved.json {
        info!(path = %path.display(), "Saved JSON snapshot");
    }
    if let Some(path) = &saved.csv {
        info!(path = %path.display(), "Saved CSV snapshot");
    }
    processor::log_top_articles(&articles, args.limit);

    if args.no_scrape {
        return Ok(saved.json);
    }

    info!("Starting article content scraping and relevance classification");
    let scraper = ArticleScraper::new(HttpPageFetcher::new()?, Pacing::default());
    let classifier = Classifier::new(llm_client(config), config.model.clone());
    if !classifier.is_available() {
        warn!("OPENAI_API_KEY not set; every scraped article is treated as relevant");
    }
    let relevant = scraper
        .process_articles(articles, args.max_scrape, &classifier)
        .await;

    if relevant.is_empty() {
        info!("No relevant cybersecurity articles found after classification");
        return Ok(saved.json);
    }

    let relevant_path = content::save_relevant_articles(&relevant, &config.output_dir).await?;
    info!(count = relevant.len(), path = %relevant_path.display(), "Saved relevant articles");
    for (i, article) in relevant.iter().take(args.limit).enumerate() {
        info!(
            rank = i + 1,
            title = %article.title,
            published = %article.published_display(),
            source = %article.source_name,
            reason = article.relevance_reason.as_deref().unwrap_or_default(),
            url = %article.url,
            "Relevant article"
        );
    }

    Ok(Some(relevant_path))
}

/// Build the report from `input`, or the latest snapshot in the output directory.
#[instrument(level = "info", skip_all)]
async fn run_report_generator(
    config: &Config,
    args: &Cli,
    input: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let input = match input {
        Some(path) => path,
        None => match report::latest_data_file(&config.output_dir, "json").await {
            Some(path) => path,
            None => {
                error!(dir = %config.output_dir.display(), "No snapshot to build a report from");
                return Ok(());
            }
        },
    };
    info!(path = %input.display(), "Using data from snapshot");

    let articles = report::load_articles(&input).await?;
    info!(count = articles.len(), model = %config.model, "Generating report");

    let client = llm_client(config);
    let text = report::generate_report(client.as_ref(), &articles, &config.model).await;

    let paths = report::save_report(&text, &config.report_dir, args.pdf).await?;
    info!(path = %paths.primary().display(), "Report saved");
    info!(preview = %report::preview(&text, PREVIEW_LINES), "Report preview");

    Ok(())
}
