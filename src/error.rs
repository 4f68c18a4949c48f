//! Crate-wide error type.
//!
//! Most stages contain their failures locally (a country, an article, a
//! request) and turn them into skips or default values, so this type mostly
//! travels as far as the stage that decides what the failure means.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("upstream API error ({code}): {message}")]
    Api {
        code: String,
        message: String,
    },

    #[error("completion contained no message content")]
    EmptyCompletion,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
