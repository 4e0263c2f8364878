//! Error taxonomy for the content pipeline.
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// A failure that may resolve itself when the request is repeated.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned {status}")]
    Status { status: StatusCode, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for TransientError {
    fn from(err: reqwest::Error) -> Self {
        TransientError::Transport(err.to_string())
    }
}

/// Failures surfaced by a content source to the presentation layer.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("missing configuration: {0}")]
    Configuration(&'static str),
    #[error("upstream unavailable after retries: {0}")]
    Transient(#[from] TransientError),
    #[error("upstream query failed with status {status}")]
    QueryFailed { status: StatusCode, body: String },
    #[error("invalid upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("not a Notion id: {0:?}")]
    InvalidId(String),
}

impl SourceError {
    /// Status the downstream surface should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SourceError::QueryFailed { status, .. } => *status,
            SourceError::InvalidId(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
