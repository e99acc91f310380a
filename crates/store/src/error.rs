//! Config store error types.

use thiserror::Error;

/// Errors from the KV store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or answered with a server-side error.
    #[error("config store unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The store answered, but not with anything this client understands.
    #[error("config store returned unexpected status {status} for key {key:?}")]
    UnexpectedStatus {
        key: String,
        status: reqwest::StatusCode,
    },

    /// A key the daemon cannot operate without is absent.
    #[error("required config key {key:?} is missing from the store")]
    KeyMissing { key: String },

    /// The response envelope for a key could not be decoded.
    #[error("could not decode store entry for key {key:?}: {reason}")]
    Decode { key: String, reason: String },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
