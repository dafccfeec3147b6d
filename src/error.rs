//! Top-level error types for chatmem.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// HTTP status of a rejected remote call, if that is what this error is.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Error::Store(StoreError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Remote message store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("remote store rejected request: {status} {status_text}")]
    Status { status: u16, status_text: String },

    /// The request never got a response (connection refused, DNS, timeout).
    #[error("remote store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body was not a message list.
    #[error("malformed remote store response: {0}")]
    Decode(String),
}

/// Local history cache errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Append recorded for a channel that was never loaded.
    #[error("channel {channel_id} has no loaded history; load it before appending")]
    UninitializedChannel { channel_id: String },
}
