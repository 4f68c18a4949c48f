//! JSON snapshots of article lists.
//!
//! Snapshots are UTF-8 arrays of [`Article`] records, indented with four
//! spaces so they stay diff-friendly for operators reading them by hand.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::Article;

/// Serialize `articles` as a pretty-printed JSON array.
pub fn to_pretty_json(articles: &[Article]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    articles.serialize(&mut ser)?;
    Ok(buf)
}

/// Write `articles` to `{dir}/{stem}_{timestamp}.json`.
///
/// # Returns
///
/// The path of the written file.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), %stem, count = articles.len()))]
pub async fn write_articles(
    articles: &[Article],
    dir: &Path,
    stem: &str,
    timestamp: &str,
) -> Result<PathBuf> {
    let json = to_pretty_json(articles)?;
    fs::create_dir_all(dir).await?;

    let path = dir.join(format!("{stem}_{timestamp}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON snapshot");

    Ok(path)
}

/// Read a JSON snapshot back into articles.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_articles(path: &Path) -> Result<Vec<Article>> {
    let bytes = fs::read(path).await?;
    let articles: Vec<Article> = serde_json::from_slice(&bytes)?;
    info!(count = articles.len(), "Loaded JSON snapshot");
    Ok(articles)
}
