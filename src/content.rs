//! Full-text scraping of article pages.
//!
//! Each page is fetched politely (a random pause before every request, a
//! longer random pause between retries) and reduced to plain text in three
//! passes:
//!
//! 1. **Publisher rules**: [`DOMAIN_RULES`] maps a domain substring to the
//!    container selectors that publisher uses. Accepted at 100+ characters.
//! 2. **Generic containers**: [`GENERIC_SELECTORS`], first one with more
//!    than 300 characters wins.
//! 3. **Whole page**: every visible text node.
//!
//! `script` and `style` contents never count as text. The result is
//! whitespace-normalized and capped at [`MAX_CONTENT_CHARS`].
//!
//! # Adding a publisher
//!
//! Append a [`DomainRule`] to [`DOMAIN_RULES`]; no code changes are needed.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::AskAsync;
use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::models::Article;
use crate::outputs::json;
use crate::utils::{file_timestamp, jittered, take_chars};

/// Hard cap on stored content, in characters.
pub const MAX_CONTENT_CHARS: usize = 15_000;
/// Appended to content cut at [`MAX_CONTENT_CHARS`].
pub const TRUNCATION_MARKER: &str = "...";

/// Minimum length for a publisher rule match to be trusted.
pub const MIN_DOMAIN_CHARS: usize = 100;
/// A generic container must exceed this length to be accepted.
pub const MIN_GENERIC_CHARS: usize = 300;

/// Filename stem of the relevant-articles snapshot.
pub const RELEVANT_STEM: &str = "cybersecurity_relevant_articles";

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) ",
    "Chrome/123.0.0.0 Safari/537.36"
);

/// Container selectors for one publisher.
#[derive(Debug)]
pub struct DomainRule {
    /// Matched as a substring of the page's host.
    pub domain: &'static str,
    /// Tried in order; the first selector present on the page is used.
    pub selectors: &'static [&'static str],
}

pub static DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        domain: "heise.de",
        selectors: &["article", "div.article-content"],
    },
    DomainRule {
        domain: "zeit.de",
        selectors: &["div.article-body", "div.summary"],
    },
    DomainRule {
        domain: "spiegel.de",
        selectors: &["div.RichText", r#"div[data-area="body"]"#],
    },
    DomainRule {
        domain: "golem.de",
        selectors: &["div.formatted", "article"],
    },
    DomainRule {
        domain: "faz.net",
        selectors: &["div.atc-Text", "div.art_txt"],
    },
    DomainRule {
        domain: "nzz.ch",
        selectors: &["div.articlecomponent", "div.content-body"],
    },
    DomainRule {
        domain: "derstandard.at",
        selectors: &["div.article-body"],
    },
];

pub const GENERIC_SELECTORS: &[&str] = &[
    "article",
    ".article",
    ".post",
    ".content",
    "main",
    "#main",
    ".main-content",
    ".entry-content",
];

const SKIPPED_TAGS: &[&str] = &["script", "style"];

static INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

/// Source of raw HTML for a URL.
pub trait PageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// [`PageFetcher`] over HTTP with a browser user agent.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,de;q=0.8"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: String::new(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Courtesy delays and retry budget, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    /// Pause before the first request for a page.
    pub request_delay: RangeInclusive<f64>,
    /// Pause after each failed attempt.
    pub retry_backoff: RangeInclusive<f64>,
    pub max_attempts: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            request_delay: 1.0..=3.0,
            retry_backoff: 2.0..=5.0,
            max_attempts: 3,
        }
    }
}

#[cfg(test)]
impl Pacing {
    /// Same retry budget, no sleeping.
    pub fn immediate() -> Self {
        Self {
            request_delay: 0.0..=0.0,
            retry_backoff: 0.0..=0.0,
            ..Self::default()
        }
    }
}

/// Visible text under `root`, text nodes joined by single spaces.
fn visible_text(root: ElementRef<'_>) -> String {
    root.descendants()
        .filter(|node| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
            })
        })
        .filter_map(|node| node.value().as_text().map(|t| t.trim()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Text of the first selector in `selectors` that matches anything.
fn first_present(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| document.select(&sel).next())
        .map(visible_text)
}

/// Extraction by publisher rule, if the host has one and it yields enough.
fn extract_by_domain(document: &Html, domain: &str) -> Option<String> {
    let rule = DOMAIN_RULES.iter().find(|r| domain.contains(r.domain))?;
    let text = first_present(document, rule.selectors)?;
    (char_len(&text) >= MIN_DOMAIN_CHARS).then_some(text)
}

/// First generic container with substantial text.
fn extract_generic(document: &Html) -> Option<String> {
    GENERIC_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .filter_map(|sel| document.select(&sel).next().map(visible_text))
        .find(|text| char_len(text) > MIN_GENERIC_CHARS)
}

/// Reduce an HTML page to its article text (uncleaned).
pub fn extract_article_text(html: &str, domain: &str) -> String {
    let document = Html::parse_document(html);
    extract_by_domain(&document, domain)
        .or_else(|| extract_generic(&document))
        .unwrap_or_else(|| visible_text(document.root_element()))
}

/// Cap `text` at [`MAX_CONTENT_CHARS`] plus [`TRUNCATION_MARKER`].
///
/// Applying this to its own output changes nothing.
pub fn truncate_content(text: &str) -> String {
    if char_len(text) > MAX_CONTENT_CHARS {
        format!("{}{}", take_chars(text, MAX_CONTENT_CHARS), TRUNCATION_MARKER)
    } else {
        text.to_string()
    }
}

/// Collapse whitespace runs, drop blank lines, then truncate.
pub fn clean_content(text: &str) -> String {
    let normalized = text
        .lines()
        .map(|line| INLINE_WS.replace_all(line.trim(), " "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    truncate_content(&normalized)
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Fetches article pages and turns them into clean text.
#[derive(Debug)]
pub struct ArticleScraper<F> {
    fetcher: F,
    pacing: Pacing,
}

impl<F: PageFetcher> ArticleScraper<F> {
    pub fn new(fetcher: F, pacing: Pacing) -> Self {
        Self { fetcher, pacing }
    }

    /// Scrape the article text at `url`.
    ///
    /// Returns `None` without any request for empty or non-HTTP(S) URLs,
    /// after [`Pacing::max_attempts`] failed attempts, and when a fetched
    /// page yields no text.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn scrape_article_content(&self, url: &str) -> Option<String> {
        if url.is_empty() || !is_http_url(url) {
            debug!("Not an HTTP(S) URL; skipping");
            return None;
        }

        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        sleep(jittered(&self.pacing.request_delay)).await;

        for attempt in 1..=self.pacing.max_attempts {
            match self.fetcher.fetch_page(url).await {
                Ok(html) => {
                    let content = clean_content(&extract_article_text(&html, &domain));
                    if content.is_empty() {
                        warn!(attempt, "Fetch produced no content");
                        return None;
                    }
                    debug!(attempt, chars = char_len(&content), "Scraped article");
                    return Some(content);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = self.pacing.max_attempts,
                        error = %e,
                        "Error scraping article"
                    );
                    sleep(jittered(&self.pacing.retry_backoff)).await;
                }
            }
        }

        None
    }

    /// Scrape and classify the first `max_articles` articles (all if `None`).
    ///
    /// Articles past the cap are never touched. Returns the relevant ones in
    /// input order, each carrying its content and classification.
    #[instrument(
        level = "info",
        skip_all,
        fields(total = articles.len(), max_articles = ?max_articles)
    )]
    pub async fn process_articles<C>(
        &self,
        articles: Vec<Article>,
        max_articles: Option<usize>,
        classifier: &Classifier<C>,
    ) -> Vec<Article>
    where
        C: AskAsync<Response = String>,
    {
        let total = articles.len();
        let selected = max_articles.unwrap_or(total).min(total);
        info!(selected, total, "Processing articles");

        let mut relevant = Vec::new();
        for (i, mut article) in articles.into_iter().take(selected).enumerate() {
            info!(index = i + 1, of = selected, url = %article.url, "Processing article");
            if article.url.is_empty() {
                continue;
            }

            let Some(content) = self.scrape_article_content(&article.url).await else {
                warn!(url = %article.url, "Failed to scrape content");
                continue;
            };
            article.content_length = Some(char_len(&content));
            article.content = content;
            info!(chars = article.content_length, "Content scraped");

            let verdict = classifier.classify(&article).await;
            article.is_cybersecurity_relevant = Some(verdict.is_relevant);
            article.relevance_reason = Some(verdict.reason);

            if verdict.is_relevant {
                info!(reason = ?article.relevance_reason, "RELEVANT");
                relevant.push(article);
            } else {
                info!(reason = ?article.relevance_reason, "NOT RELEVANT");
            }
        }

        info!(
            relevant = relevant.len(),
            processed = selected,
            "Classification complete"
        );
        relevant
    }
}

/// Persist the relevant subset as `cybersecurity_relevant_articles_<ts>.json`.
pub async fn save_relevant_articles(articles: &[Article], dir: &Path) -> Result<PathBuf> {
    json::write_articles(articles, dir, RELEVANT_STEM, &file_timestamp()).await
}
