//! Error types for the library layers

use std::path::PathBuf;
use thiserror::Error;

/// Failure fetching a catalog or detail page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Failure reading or writing the dataset files
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dataset JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write CSV {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Failure talking to the language model
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM client configuration error: {0}")]
    Config(String),

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("unexpected LLM response: {0}")]
    Response(String),
}
