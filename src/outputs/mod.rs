//! Flat-file artifacts written by the pipeline.
//!
//! # Submodules
//!
//! - [`json`]: pretty-printed article snapshots
//! - [`csv`]: best-effort tabular copy of a snapshot
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── cybersecurity_news_20250506_143000.json
//! ├── cybersecurity_news_20250506_143000.csv
//! └── cybersecurity_relevant_articles_20250506_144512.json
//!
//! reports/
//! ├── cybersecurity_report_20250506_144530.md
//! └── cybersecurity_report_20250506_144530.pdf
//! ```
//!
//! The report files are written by [`crate::report`].

pub mod csv;
pub mod json;
