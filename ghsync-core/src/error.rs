//! Error types for ghsync-core

use thiserror::Error;

/// Main error type for the ghsync-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote call exceeded its deadline
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Non-timeout network failure
    #[error("transport error: {0}")]
    Transport(String),

    /// GraphQL request failed (non-200 status or transport failure)
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A raw event is missing a required common field
    #[error("malformed event {id}: {message}")]
    MalformedEvent { id: String, message: String },

    /// Stored repository full name is not splittable into owner/name
    #[error("malformed repository name: {0}")]
    MalformedRepoName(String),
}

/// Result type alias for ghsync-core
pub type Result<T> = std::result::Result<T, Error>;
