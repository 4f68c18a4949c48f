//! Small helpers shared by the pipeline stages.
//!
//! - Timestamps for artifact filenames
//! - Character-safe truncation for logs and prompt excerpts
//! - Randomized courtesy delays
//! - File system validation for output directories

use chrono::Local;
use rand::{Rng, rng};
use std::fs as stdfs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;

/// Second-resolution timestamp embedded in every artifact filename.
///
/// Two runs within the same second produce the same name; the later write wins.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the characters dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        format!("{}…(+{} chars)", take_chars(s, max), total - max)
    }
}

/// The first `n` characters of `s`, never splitting a code point.
pub fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// A uniformly random delay drawn from `secs`, in seconds.
///
/// Ranges ending at or below zero yield no delay at all.
pub fn jittered(secs: &RangeInclusive<f64>) -> Duration {
    if *secs.end() <= 0.0 {
        return Duration::ZERO;
    }
    let low = secs.start().max(0.0);
    Duration::from_secs_f64(rng().random_range(low..=*secs.end()))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
