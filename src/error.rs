use thiserror::Error;

/// Failures inside the upstream client. Never returned past [`crate::api::Upstream`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid JSON body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("payload has no response envelope")]
    MissingEnvelope,
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("unrecognised draw date {0:?}")]
    BadDate(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("blob of {size} bytes exceeds quota of {quota} bytes")]
    QuotaExceeded { size: usize, quota: usize },
}
