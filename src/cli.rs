//! Command-line interface definitions.
//!
//! Credentials and the common knobs can also come from environment variables
//! (or a `.env` file, loaded before parsing). Anything not given here falls
//! back to the optional YAML config file, then to built-in defaults.

use clap::Parser;
use std::path::PathBuf;

/// Collect, classify and summarize DACH cybersecurity news.
///
/// # Examples
///
/// ```sh
/// # Full run: fetch, scrape + classify, report
/// dach_cyber_news
///
/// # Two-week window, only scrape the 20 newest articles, render a PDF
/// dach_cyber_news --days 14 --max-scrape 20 --pdf
///
/// # Report from an existing snapshot
/// dach_cyber_news --report-only --input data/cybersecurity_relevant_articles_20250506_144512.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Number of days to look back for news (default: 7)
    #[arg(short, long, env = "DAYS_BACK")]
    pub days: Option<i64>,

    /// Directory for article snapshots (default: data)
    #[arg(short, long, env = "OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Number of articles to show in the run summary
    #[arg(short, long, default_value_t = 5)]
    pub limit: usize,

    /// Maximum number of articles to scrape content for (default: all)
    #[arg(long)]
    pub max_scrape: Option<usize>,

    /// Snapshot to build the report from (default: latest JSON in the output directory)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for reports (default: reports)
    #[arg(long)]
    pub report_output: Option<PathBuf>,

    /// Chat model for classification and report generation (default: gpt-4o-mini)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Only generate a report from existing data (skip fetching)
    #[arg(long)]
    pub report_only: bool,

    /// Skip report generation
    #[arg(long, conflicts_with = "report_only")]
    pub no_report: bool,

    /// Skip content scraping and relevance classification
    #[arg(long)]
    pub no_scrape: bool,

    /// Also render the report to PDF (requires pandoc)
    #[arg(long)]
    pub pdf: bool,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// News API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// API key for the chat-completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,
}
