//! Normalization, deduplication and the first snapshot.
//!
//! Raw payloads become [`Article`] values, duplicates by exact URL are
//! dropped (first occurrence wins, so top-headline records beat full-text
//! search records for the same URL), and the result is ordered newest first.

use itertools::Itertools;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::{Article, RawArticle};
use crate::outputs::{csv, json};
use crate::utils::{file_timestamp, truncate_for_log};

/// Filename stem of the deduplicated snapshot.
pub const NEWS_STEM: &str = "cybersecurity_news";

/// Paths of the artifacts written by [`save_articles`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedPaths {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

/// Normalize, deduplicate by URL and sort newest first.
///
/// Records without a URL have no natural key and are dropped. Records with
/// no parseable timestamp keep their relative order and go last.
#[instrument(level = "info", skip_all, fields(input = raw.len()))]
pub fn process_articles(raw: Vec<RawArticle>) -> Vec<Article> {
    let mut articles: Vec<Article> = raw
        .iter()
        .map(Article::from_raw)
        .filter(|a| !a.url.is_empty())
        .unique_by(|a| a.url.clone())
        .collect();

    // stable: equal timestamps keep fetch order
    articles.sort_by_key(|a| Reverse(a.published_at));
    info!(unique = articles.len(), "Deduplicated articles");
    articles
}

/// Persist the deduplicated set as JSON and, best-effort, CSV.
///
/// An empty list writes nothing. A CSV failure is logged and leaves the JSON
/// artifact untouched.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), count = articles.len()))]
pub async fn save_articles(articles: &[Article], dir: &Path) -> Result<SavedPaths> {
    if articles.is_empty() {
        warn!("No articles to save");
        return Ok(SavedPaths::default());
    }

    let timestamp = file_timestamp();
    let json_path = json::write_articles(articles, dir, NEWS_STEM, &timestamp).await?;

    let csv_path = match csv::write_articles(articles, dir, NEWS_STEM, &timestamp).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, "Could not write CSV; only JSON output will be available");
            None
        }
    };

    Ok(SavedPaths {
        json: Some(json_path),
        csv: csv_path,
    })
}

/// Log a readable summary of the first `limit` articles.
pub fn log_top_articles(articles: &[Article], limit: usize) {
    if articles.is_empty() {
        info!("No articles to display");
        return;
    }

    info!(shown = limit.min(articles.len()), "Most recent cybersecurity news articles");
    for (i, article) in articles.iter().take(limit).enumerate() {
        info!(
            rank = i + 1,
            title = %article.title,
            published = %article.published_display(),
            source = %article.source_name,
            description = %truncate_for_log(&article.description, 100),
            url = %article.url,
            "Article"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiEndpoint, Country};
    use crate::news_api::tests::{StubSource, payload};
    use crate::news_api::fetch_all_cybersecurity_news;
    use serde_json::json;

    fn raw(url: &str, published_at: &str, endpoint: ApiEndpoint) -> RawArticle {
        RawArticle {
            payload: payload(url, published_at),
            country: None,
            api_endpoint: endpoint,
        }
    }

    #[test]
    fn test_duplicates_collapse_to_first_occurrence() {
        let mut input = vec![
            raw("https://dup.de/x", "2025-05-01T10:00:00Z", ApiEndpoint::TopHeadlines),
            raw("https://a.de/1", "2025-05-02T10:00:00Z", ApiEndpoint::TopHeadlines),
            raw("https://dup.de/x", "2025-05-03T10:00:00Z", ApiEndpoint::Everything),
            raw("https://a.de/2", "2025-05-04T10:00:00Z", ApiEndpoint::Everything),
            raw("https://dup.de/x", "2025-05-05T10:00:00Z", ApiEndpoint::Everything),
        ];
        input[0].payload["title"] = json!("first");

        let articles = process_articles(input);

        // 3 copies of one URL + 2 distinct URLs
        assert_eq!(articles.len(), 3);
        let dup: Vec<_> = articles.iter().filter(|a| a.url == "https://dup.de/x").collect();
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].title, "first");
        assert_eq!(dup[0].api_endpoint, Some(ApiEndpoint::TopHeadlines));
    }

    #[test]
    fn test_sorted_newest_first_with_missing_dates_last() {
        let input = vec![
            raw("https://a.de/none", "", ApiEndpoint::TopHeadlines),
            raw("https://a.de/t2", "2025-05-01T10:00:00Z", ApiEndpoint::TopHeadlines),
            raw("https://a.de/bad", "not a date", ApiEndpoint::TopHeadlines),
            raw("https://a.de/t1", "2025-05-02T10:00:00+02:00", ApiEndpoint::Everything),
        ];

        let urls: Vec<_> = process_articles(input).into_iter().map(|a| a.url).collect();

        assert_eq!(
            urls,
            vec!["https://a.de/t1", "https://a.de/t2", "https://a.de/none", "https://a.de/bad"]
        );
    }

    #[test]
    fn test_records_without_url_are_dropped() {
        let mut no_url = raw("", "2025-05-01T10:00:00Z", ApiEndpoint::TopHeadlines);
        no_url.payload.as_object_mut().unwrap().remove("url");
        let input = vec![no_url, raw("https://a.de/1", "", ApiEndpoint::TopHeadlines)];

        let articles = process_articles(input);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://a.de/1");
    }

    #[tokio::test]
    async fn test_save_articles_writes_json_and_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let articles = process_articles(vec![raw("https://a.de/1", "", ApiEndpoint::TopHeadlines)]);

        let paths = save_articles(&articles, tmp.path()).await.unwrap();

        let json_path = paths.json.unwrap();
        let csv_path = paths.csv.unwrap();
        assert!(json_path.exists() && csv_path.exists());
        assert_eq!(json_path.file_stem(), csv_path.file_stem());
        let name = json_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("cybersecurity_news_"));
    }

    #[tokio::test]
    async fn test_save_nothing_for_empty_input() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(save_articles(&[], tmp.path()).await.unwrap(), SavedPaths::default());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_two_countries_overlap_plus_full_text_search() {
        // Both countries return the same headline URL; the full-text search
        // adds a third URL.
        let mut source = StubSource::default();
        source.headlines.insert(
            Country::De,
            Ok(vec![payload("https://www.heise.de/news/shared", "2025-05-03T08:00:00Z")]),
        );
        source.headlines.insert(
            Country::At,
            Ok(vec![payload("https://www.heise.de/news/shared", "2025-05-03T08:00:00Z")]),
        );
        source.everything = Some(Ok(vec![payload(
            "https://www.nzz.ch/technologie/third",
            "2025-05-04T08:00:00Z",
        )]));

        let raw = fetch_all_cybersecurity_news(&source, &[Country::De, Country::At], 7).await;
        assert_eq!(raw.len(), 3);
        let endpoints: Vec<_> = raw.iter().map(|r| r.api_endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["top-headlines", "top-headlines", "everything"]);

        let articles = process_articles(raw);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://www.nzz.ch/technologie/third");
        assert_eq!(articles[1].country, Some(Country::De));

        let tmp = tempfile::tempdir().unwrap();
        let paths = save_articles(&articles, tmp.path()).await.unwrap();
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(paths.json.unwrap()).unwrap()).unwrap();
        let endpoints: Vec<_> = written
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["api_endpoint"].as_str().unwrap())
            .collect();
        assert_eq!(endpoints, vec!["everything", "top-headlines"]);
    }

    #[tokio::test]
    async fn test_three_distinct_records_reach_the_snapshot() {
        let mut source = StubSource::default();
        source.headlines.insert(
            Country::De,
            Ok(vec![payload("https://www.spiegel.de/a", "2025-05-01T08:00:00Z")]),
        );
        source.headlines.insert(
            Country::Ch,
            Ok(vec![payload("https://www.nzz.ch/b", "2025-05-02T08:00:00Z")]),
        );
        source.everything = Some(Ok(vec![payload(
            "https://www.golem.de/c",
            "2025-05-03T08:00:00Z",
        )]));

        let raw = fetch_all_cybersecurity_news(&source, &[Country::De, Country::Ch], 7).await;
        let articles = process_articles(raw);
        let tmp = tempfile::tempdir().unwrap();
        let paths = save_articles(&articles, tmp.path()).await.unwrap();

        let written = json::read_articles(&paths.json.unwrap()).await.unwrap();
        assert_eq!(written.len(), 3);
        let provenance: Vec<_> = written
            .iter()
            .map(|a| (a.url.as_str(), a.api_endpoint.map(|e| e.as_str())))
            .collect();
        assert_eq!(
            provenance,
            vec![
                ("https://www.golem.de/c", Some("everything")),
                ("https://www.nzz.ch/b", Some("top-headlines")),
                ("https://www.spiegel.de/a", Some("top-headlines")),
            ]
        );
    }
}
