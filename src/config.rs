//! Runtime configuration.
//!
//! Values are resolved in this order, first hit wins:
//!
//! 1. command-line flags and their environment variables ([`Cli`])
//! 2. the optional YAML file ([`FileConfig`])
//! 3. built-in defaults
//!
//! Empty strings count as unset, so `OPENAI_API_KEY=` disables the model.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::news_api::NEWS_API_URL;

pub const DEFAULT_DAYS_BACK: i64 = 7;
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_REPORT_DIR: &str = "reports";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Contents of the optional YAML config file.
///
/// ```yaml
/// news_api_key: "..."
/// openai_base_url: "http://localhost:8080/v1"
/// model: gpt-4o-mini
/// days_back: 14
/// output_dir: /var/lib/dach_cyber_news/data
/// report_dir: /var/lib/dach_cyber_news/reports
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub news_api_key: Option<String>,
    pub news_api_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: Option<String>,
    pub days_back: Option<i64>,
    pub output_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    #[instrument(level = "info", fields(path = %path.display()), skip_all)]
    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        let config = Self::from_yaml(&text)?;
        info!("Loaded config file");
        Ok(config)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub news_api_key: Option<String>,
    pub news_api_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub days_back: i64,
    pub output_dir: PathBuf,
    pub report_dir: PathBuf,
}

fn usable(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        Self {
            news_api_key: usable(cli.news_api_key.clone()).or(usable(file.news_api_key)),
            news_api_base_url: usable(file.news_api_base_url)
                .unwrap_or_else(|| NEWS_API_URL.to_string()),
            openai_api_key: usable(cli.openai_api_key.clone()).or(usable(file.openai_api_key)),
            openai_base_url: usable(cli.openai_base_url.clone()).or(usable(file.openai_base_url)),
            model: usable(cli.model.clone())
                .or(usable(file.model))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            days_back: cli.days.or(file.days_back).unwrap_or(DEFAULT_DAYS_BACK),
            output_dir: cli
                .output
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            report_dir: cli
                .report_output
                .clone()
                .or(file.report_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIR)),
        }
    }

    /// The news API key, which fetching cannot do without.
    pub fn require_news_api_key(&self) -> Result<&str> {
        self.news_api_key
            .as_deref()
            .ok_or(Error::MissingCredential("NEWS_API_KEY"))
    }
}
