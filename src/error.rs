//! Error types

/// Result type alias for trendwiki operations.
pub type Result<T> = std::result::Result<T, TrendError>;

#[derive(Debug, thiserror::Error)]
pub enum TrendError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Trending query failed: {0}")]
    Query(String),

    #[error("Summary lookup failed for {article}: {message}")]
    Summary { article: String, message: String },

    #[error("Publishing to {page} failed: {message}")]
    Publish { page: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
