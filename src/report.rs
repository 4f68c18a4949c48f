//! Narrative report synthesis.
//!
//! The first [`MAX_REPORT_ARTICLES`] articles are condensed into short
//! blocks, embedded into a five-section analyst prompt and sent to the model
//! in one call. The answer is the report; it is stored verbatim as markdown
//! and optionally handed to `pandoc` for a PDF.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use crate::api::{AskAsync, ChatMessage, ChatRequest};
use crate::error::{Error, Result};
use crate::models::Article;
use crate::outputs::json;
use crate::utils::{file_timestamp, take_chars};

pub const MAX_REPORT_ARTICLES: usize = 30;
/// Characters of content shown per article in the prompt.
pub const REPORT_EXCERPT_CHARS: usize = 200;

pub const NO_CLIENT_REPORT: &str = "Error: OpenAI API key not available. Cannot generate report.";

pub const REPORT_STEM: &str = "cybersecurity_report";
pub const REPORT_TITLE: &str = "Cybersecurity Intelligence Report";

const REPORT_PROMPT: &str = "You are a cybersecurity analyst tasked with creating a comprehensive report about recent cybersecurity incidents and trends in the DACH region (Germany, Austria, Switzerland).

Below are recent news articles about cybersecurity from the DACH region:

{article_context}

Based on these articles, create a comprehensive cybersecurity report with the following sections:

1. Executive Summary - A brief overview of the key findings and trends
2. Major Incidents - Detailed analysis of significant cybersecurity incidents
3. Emerging Threats - New and evolving cybersecurity threats in the region
4. Industry Impact - How these incidents affect different industries
5. Recommendations - Practical advice for organizations to protect themselves

Use a professional, analytical tone. The report should be well-structured with clear headings and organized content.
Focus on extracting valuable insights and patterns from the provided news articles.

REPORT:
";

/// One numbered block per article, at most [`MAX_REPORT_ARTICLES`].
pub fn build_article_context(articles: &[Article]) -> String {
    articles
        .iter()
        .take(MAX_REPORT_ARTICLES)
        .enumerate()
        .map(|(i, a)| {
            let published = a.published_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            let excerpt = if a.content.is_empty() {
                String::new()
            } else if a.content.chars().count() > REPORT_EXCERPT_CHARS {
                format!("\n   Content: {}...", take_chars(&a.content, REPORT_EXCERPT_CHARS))
            } else {
                format!("\n   Content: {}", a.content)
            };
            format!(
                "{}. {}\n   Published: {} by {}\n   {}{}\n   URL: {}\n",
                i + 1,
                a.title,
                published,
                a.source_name,
                a.description,
                excerpt,
                a.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_report_prompt(articles: &[Article]) -> String {
    REPORT_PROMPT.replace("{article_context}", &build_article_context(articles))
}

/// Ask the model for the report.
///
/// Never fails: without a client, or when the call errors, the returned text
/// is an explanatory error line instead of a report.
#[instrument(level = "info", skip_all, fields(articles = articles.len(), %model))]
pub async fn generate_report<C>(client: Option<&C>, articles: &[Article], model: &str) -> String
where
    C: AskAsync<Response = String>,
{
    let Some(client) = client else {
        warn!("No LLM credential; cannot generate report");
        return NO_CLIENT_REPORT.to_string();
    };

    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user(build_report_prompt(articles))],
        temperature: 0.3,
        max_tokens: None,
    };

    match client.ask(&request).await {
        Ok(report) => {
            info!(bytes = report.len(), "Report generated");
            report
        }
        Err(e) => {
            error!(error = %e, "Error generating report");
            format!("Error generating report: {e}")
        }
    }
}

/// Artifacts written by [`save_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub pdf: Option<PathBuf>,
}

impl ReportPaths {
    /// The richest artifact available.
    pub fn primary(&self) -> &Path {
        self.pdf.as_deref().unwrap_or(self.markdown.as_path())
    }
}

/// Write the report as markdown and, if asked, render a PDF next to it.
///
/// A failed PDF render is logged; the markdown file is kept either way.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), render_pdf = render_pdf))]
pub async fn save_report(report: &str, dir: &Path, render_pdf: bool) -> Result<ReportPaths> {
    fs::create_dir_all(dir).await?;

    let timestamp = file_timestamp();
    let markdown = dir.join(format!("{REPORT_STEM}_{timestamp}.md"));
    fs::write(&markdown, report).await?;
    info!(path = %markdown.display(), "Wrote markdown report");

    let pdf = if render_pdf {
        let pdf_path = markdown.with_extension("pdf");
        match render_pdf_with_pandoc(&markdown, &pdf_path).await {
            Ok(()) => {
                info!(path = %pdf_path.display(), "PDF report generated");
                Some(pdf_path)
            }
            Err(e) => {
                warn!(error = %e, "PDF generation failed; markdown report only");
                None
            }
        }
    } else {
        None
    };

    Ok(ReportPaths { markdown, pdf })
}

async fn render_pdf_with_pandoc(markdown: &Path, pdf: &Path) -> Result<()> {
    let output = Command::new("pandoc")
        .arg(markdown)
        .arg("--metadata")
        .arg(format!("title={REPORT_TITLE}"))
        .arg("-o")
        .arg(pdf)
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Io(std::io::Error::other(format!(
            "pandoc exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))))
    }
}

/// Load report input from a snapshot file.
pub async fn load_articles(path: &Path) -> Result<Vec<Article>> {
    json::read_articles(path).await
}

/// Most recently modified file with extension `ext` in `dir`.
///
/// Operator convenience only: the pipeline itself passes explicit paths.
pub async fn latest_data_file(dir: &Path, ext: &str) -> Option<PathBuf> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Data directory not readable");
            return None;
        }
    };

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ext) {
            continue;
        }
        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    if newest.is_none() {
        warn!(dir = %dir.display(), ext, "No data files found");
    }
    newest.map(|(_, path)| path)
}

/// First `lines` lines of the report, for the operator log.
pub fn preview(report: &str, lines: usize) -> String {
    let mut out = report.lines().take(lines).collect::<Vec<_>>().join("\n");
    if report.lines().count() > lines {
        out.push_str("\n...");
    }
    out
}
