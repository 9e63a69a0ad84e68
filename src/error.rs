//! Error types for the Paprika cloud client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, PaprikaError>;

/// The remote accepted the HTTP request but the decoded body carries an
/// application-level error indicator. HTTP status alone is not enough to
/// call a request successful.
#[derive(Debug, Error)]
#[error("remote reported an error for {path}: {detail}")]
pub struct RequestError {
    /// API path that produced the error.
    pub path: String,
    /// The `error` payload from the response body, rendered as JSON.
    pub detail: String,
}

/// Errors that can occur while talking to the Paprika cloud.
#[derive(Debug, Error)]
pub enum PaprikaError {
    /// HTTP succeeded but the body signals an application error.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Login failed: bad credentials, unexpected login status, or a login
    /// response without a token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure after the retry budget was exhausted.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// A 2xx response whose body does not have the expected shape.
    #[error("unexpected response from {path}: {detail}")]
    UnexpectedResponse {
        /// API path that produced the response.
        path: String,
        /// What was wrong with the body.
        detail: String,
    },

    /// Persistent cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// Recipe payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure (cache directory creation and the like).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}
