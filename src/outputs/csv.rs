//! Tabular copy of an article snapshot.
//!
//! The CSV is a convenience for spreadsheet users. Callers treat any error
//! from here as non-fatal.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::Article;

/// Render `articles` as CSV with a header row.
pub fn to_csv(articles: &[Article]) -> Result<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "source_name",
        "author",
        "title",
        "description",
        "url",
        "url_to_image",
        "published_at",
        "content",
        "country",
        "api_endpoint",
    ])?;

    for a in articles {
        let published = a.published_at.map(|t| t.to_rfc3339()).unwrap_or_default();
        writer.write_record([
            a.source_name.as_str(),
            a.author.as_str(),
            a.title.as_str(),
            a.description.as_str(),
            a.url.as_str(),
            a.url_to_image.as_str(),
            published.as_str(),
            a.content.as_str(),
            a.country.map(|c| c.code()).unwrap_or_default(),
            a.api_endpoint.map(|e| e.as_str()).unwrap_or_default(),
        ])?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Write `articles` to `{dir}/{stem}_{timestamp}.csv`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), %stem))]
pub async fn write_articles(
    articles: &[Article],
    dir: &Path,
    stem: &str,
    timestamp: &str,
) -> Result<PathBuf> {
    let bytes = to_csv(articles)?;
    let path = dir.join(format!("{stem}_{timestamp}.csv"));
    fs::write(&path, bytes).await?;
    info!(path = %path.display(), "Wrote CSV snapshot");
    Ok(path)
}
