//! News index client and the DACH cybersecurity fetch.
//!
//! Two searches are issued against the news API:
//!
//! | Endpoint | Scope | Tag |
//! |----------|-------|-----|
//! | `/top-headlines` | one request per country, technology category | country + `top-headlines` |
//! | `/everything` | one request over a fixed allowlist of DACH domains | `everything` |
//!
//! Both use the same OR-combined keyword query. Failures never abort the
//! fetch: a country (or the full-text search) that errors contributes zero
//! records and the run moves on.

use chrono::{Local, NaiveDate, TimeDelta};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{ApiEndpoint, Country, RawArticle};

pub const NEWS_API_URL: &str = "https://newsapi.org/v2";

/// Maximum page size the news API accepts.
pub const PAGE_SIZE: u32 = 100;

/// Search vocabulary, English and German.
pub const CYBERSECURITY_KEYWORDS: &[&str] = &[
    "cybersecurity",
    "cyber security",
    "cyber-security",
    "hack",
    "hacking",
    "data breach",
    "ransomware",
    "malware",
    "phishing",
    "cyber attack",
    "cyber-attack",
    "cyberangriff",
    "datenschutz",
    "datenleck",
    "cyberkriminalität",
    "it-sicherheit",
    "datensicherheit",
    "hackerangriff",
];

/// Publishers searched by the full-text query.
pub const DACH_DOMAINS: &[&str] = &[
    "spiegel.de",
    "faz.net",
    "zeit.de",
    "nzz.ch",
    "derstandard.at",
    "heise.de",
    "golem.de",
    "welt.de",
    "sueddeutsche.de",
    "diepresse.com",
    "tagesanzeiger.ch",
];

/// Each keyword quoted as a phrase, joined with ` OR `.
pub fn build_query() -> String {
    CYBERSECURITY_KEYWORDS
        .iter()
        .map(|kw| format!("\"{kw}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Parameters of a `/top-headlines` request.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlinesQuery {
    pub q: String,
    pub country: Country,
    pub category: &'static str,
    pub language: &'static str,
    pub page_size: u32,
}

/// Parameters of an `/everything` request.
#[derive(Debug, Clone, PartialEq)]
pub struct EverythingQuery {
    pub q: String,
    pub domains: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub language: &'static str,
    pub sort_by: &'static str,
    pub page_size: u32,
}

impl EverythingQuery {
    /// Full-text search over [`DACH_DOMAINS`] for the last `days_back` days.
    ///
    /// `None` when the window reaches outside the representable calendar.
    pub fn dach(q: String, today: NaiveDate, days_back: i64) -> Option<Self> {
        let from = TimeDelta::try_days(days_back).and_then(|d| today.checked_sub_signed(d))?;
        Some(Self {
            q,
            domains: DACH_DOMAINS.join(","),
            from,
            to: today,
            language: "de",
            sort_by: "relevancy",
            page_size: PAGE_SIZE,
        })
    }
}

/// A news index that can answer both searches.
///
/// Implementations return the raw article payloads of a successful response
/// and an error for anything else (transport failure, non-2xx, non-`ok`).
pub trait NewsSource {
    async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<Vec<Value>>;
    async fn everything(&self, query: &EverythingQuery) -> Result<Vec<Value>>;
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Value>,
}

/// HTTP client for the news API.
#[derive(Clone)]
pub struct NewsApiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            base_url: NEWS_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, endpoint: ApiEndpoint, params: &[(&str, String)]) -> Result<Vec<Value>> {
        let url = format!("{}/{}", self.base_url, endpoint.as_str());
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        parse_response(&body)
    }
}

/// Decode a news API body, turning a non-`ok` status into an error.
fn parse_response(body: &str) -> Result<Vec<Value>> {
    let parsed: NewsApiResponse = serde_json::from_str(body)?;
    if parsed.status != "ok" {
        return Err(Error::Api {
            code: parsed.code.unwrap_or_else(|| "unknown".to_string()),
            message: parsed.message.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    Ok(parsed.articles)
}

impl NewsSource for NewsApiClient {
    async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<Vec<Value>> {
        let params = [
            ("q", query.q.clone()),
            ("country", query.country.code().to_string()),
            ("category", query.category.to_string()),
            ("language", query.language.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        self.get(ApiEndpoint::TopHeadlines, &params).await
    }

    async fn everything(&self, query: &EverythingQuery) -> Result<Vec<Value>> {
        let params = [
            ("q", query.q.clone()),
            ("domains", query.domains.clone()),
            ("from", query.from.format("%Y-%m-%d").to_string()),
            ("to", query.to.format("%Y-%m-%d").to_string()),
            ("language", query.language.to_string()),
            ("sortBy", query.sort_by.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        self.get(ApiEndpoint::Everything, &params).await
    }
}

/// Top headlines for each country, in country order, tagged with provenance.
#[instrument(level = "info", skip_all, fields(countries = countries.len()))]
pub async fn fetch_top_headlines<S: NewsSource>(
    source: &S,
    countries: &[Country],
    q: &str,
) -> Vec<RawArticle> {
    let per_country: Vec<Vec<RawArticle>> = stream::iter(countries.iter().copied())
        .then(|country| async move {
            let query = HeadlinesQuery {
                q: q.to_string(),
                country,
                category: "technology",
                language: country.language(),
                page_size: PAGE_SIZE,
            };
            match source.top_headlines(&query).await {
                Ok(articles) => {
                    info!(%country, count = articles.len(), "Fetched top headlines");
                    articles
                        .into_iter()
                        .map(|payload| RawArticle {
                            payload,
                            country: Some(country),
                            api_endpoint: ApiEndpoint::TopHeadlines,
                        })
                        .collect()
                }
                Err(e) => {
                    warn!(%country, error = %e, "Top headlines request failed; skipping country");
                    Vec::new()
                }
            }
        })
        .collect()
        .await;

    per_country.into_iter().flatten().collect()
}

/// The full-text search over DACH publishers.
#[instrument(level = "info", skip_all, fields(days_back = days_back))]
pub async fn fetch_everything<S: NewsSource>(
    source: &S,
    q: &str,
    today: NaiveDate,
    days_back: i64,
) -> Vec<RawArticle> {
    let Some(query) = EverythingQuery::dach(q.to_string(), today, days_back) else {
        warn!(days_back, "Search window out of range; skipping full-text search");
        return Vec::new();
    };
    debug!(from = %query.from, to = %query.to, "Full-text search window");

    match source.everything(&query).await {
        Ok(articles) => {
            info!(count = articles.len(), "Fetched full-text search results");
            articles
                .into_iter()
                .map(|payload| RawArticle {
                    payload,
                    country: None,
                    api_endpoint: ApiEndpoint::Everything,
                })
                .collect()
        }
        Err(e) => {
            warn!(error = %e, "Full-text search failed; continuing without it");
            Vec::new()
        }
    }
}

/// Headlines for every country followed by the full-text search results.
///
/// No deduplication happens here; the same URL may appear more than once.
pub async fn fetch_all_cybersecurity_news<S: NewsSource>(
    source: &S,
    countries: &[Country],
    days_back: i64,
) -> Vec<RawArticle> {
    let q = build_query();
    let mut all = fetch_top_headlines(source, countries, &q).await;
    all.extend(fetch_everything(source, &q, Local::now().date_naive(), days_back).await);
    info!(count = all.len(), "Fetched raw articles");
    all
}
