//! Data models for news articles as they move through the pipeline.
//!
//! - [`RawArticle`]: a payload from the news API, tagged with where it came from
//! - [`Article`]: the canonical record every later stage operates on
//! - [`Country`] and [`ApiEndpoint`]: provenance of a record
//!
//! Raw payloads are kept as untyped JSON because the news index does not
//! promise a stable shape; [`Article::from_raw`] does the defensive mapping.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A DACH market queried for top headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Country {
    De,
    At,
    Ch,
}

impl Country {
    /// All markets in query order.
    pub const DACH: [Country; 3] = [Country::De, Country::At, Country::Ch];

    /// Two-letter code used by the news API.
    pub fn code(self) -> &'static str {
        match self {
            Country::De => "de",
            Country::At => "at",
            Country::Ch => "ch",
        }
    }

    /// Headline language for this market. All DACH markets publish in German.
    pub fn language(self) -> &'static str {
        match self {
            Country::De | Country::At | Country::Ch => "de",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which news API endpoint produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiEndpoint {
    #[serde(rename = "top-headlines")]
    TopHeadlines,
    #[serde(rename = "everything")]
    Everything,
}

impl ApiEndpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiEndpoint::TopHeadlines => "top-headlines",
            ApiEndpoint::Everything => "everything",
        }
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An untouched news API payload plus the provenance assigned at fetch time.
#[derive(Debug, Clone)]
pub struct RawArticle {
    pub payload: Value,
    pub country: Option<Country>,
    pub api_endpoint: ApiEndpoint,
}

/// The canonical article record.
///
/// Scraping and classification fill in the trailing optional fields; they are
/// left out of the JSON snapshot until set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub source_name: String,
    pub author: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub url_to_image: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub content: String,
    pub country: Option<Country>,
    pub api_endpoint: Option<ApiEndpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cybersecurity_relevant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_reason: Option<String>,
}

impl Article {
    /// Map a raw payload onto the canonical shape.
    ///
    /// Missing, null or non-string fields become empty strings and an
    /// unparseable `publishedAt` becomes `None`; this never fails.
    pub fn from_raw(raw: &RawArticle) -> Self {
        let p = &raw.payload;
        let text = |key: &str| p.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

        Article {
            source_name: p
                .get("source")
                .and_then(|s| s.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            author: text("author"),
            title: text("title"),
            description: text("description"),
            url: text("url"),
            url_to_image: text("urlToImage"),
            published_at: p
                .get("publishedAt")
                .and_then(Value::as_str)
                .and_then(parse_published_at),
            content: text("content"),
            country: raw.country,
            api_endpoint: Some(raw.api_endpoint),
            ..Default::default()
        }
    }

    /// Publication time formatted for humans, `Unknown date` when absent.
    pub fn published_display(&self) -> String {
        self.published_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Unknown date".to_string())
    }
}

/// Parse the news API's timestamp.
///
/// Accepts RFC 3339 (`2025-05-06T14:30:00Z`, `...+02:00`) and naive
/// `YYYY-MM-DDTHH:MM:SS[.f]`, which is taken as UTC.
pub fn parse_published_at(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}
