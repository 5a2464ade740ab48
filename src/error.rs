//! Custom error types for sitesearch

use thiserror::Error;

/// Main error type for sitesearch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL is outside the configured site list: {0}")]
    UrlOutsideSites(String),

    #[error("Empty search query")]
    EmptyQuery,

    #[error("Indexing is not finished for the requested sites")]
    IndexNotReady,

    #[error("Indexing is already running")]
    IndexingAlreadyRunning,

    #[error("Indexing is not running")]
    IndexingNotRunning,

    #[error("Lemmatization error: {0}")]
    Lemma(String),

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for sitesearch
pub type Result<T> = std::result::Result<T, Error>;
