//! Custom error types for storyline

use thiserror::Error;

/// Main error type for storyline operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Narrative error: {0}")]
    Narrative(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

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

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Failures of an external AI provider. The affected unit of work is
    /// skipped for the current cycle and retried on the next one.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_) | Error::Narrative(_) | Error::MalformedResponse(_) | Error::Http(_)
        )
    }

    /// The record vanished between read and write (e.g. a concurrent delete)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TopicNotFound(_) | Error::ArticleNotFound(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{:#}", err))
    }
}

/// Result type alias for storyline
pub type Result<T> = std::result::Result<T, Error>;
