//! Directory error taxonomy.
//!
//! The variants encode the failover policy: only
//! [`DirectoryError::EndpointUnreachable`] lets the updater move on to the
//! next endpoint; everything else ends the call.

use thiserror::Error;

use crate::endpoint::DirectoryEndpoint;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from one propagation attempt.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be connected or bound. The updater advances to
    /// the next endpoint; this also covers transport drops during the read.
    #[error("directory server {endpoint} unreachable: {source}")]
    EndpointUnreachable {
        endpoint: DirectoryEndpoint,
        #[source]
        source: Source,
    },

    /// The configuration entry does not exist. Terminal for the whole call:
    /// a missing entry is a provisioning problem, not a connectivity one.
    #[error("no configuration entry at {base_dn}")]
    EntryNotFound { base_dn: String },

    /// The server answered the search with a protocol-level failure other
    /// than "no such object". Terminal.
    #[error("search against {endpoint} failed: {source}")]
    ReadFailed {
        endpoint: DirectoryEndpoint,
        #[source]
        source: Source,
    },

    /// The entry exists but one of its attributes is not what the updater
    /// can safely rewrite. Terminal.
    #[error("configuration entry attribute {attribute} is malformed: {reason}")]
    MalformedEntry {
        attribute: &'static str,
        reason: String,
    },

    /// The revision assertion did not hold: another writer changed the
    /// entry between our read and write. Terminal; the cycle retries from a
    /// fresh read next tick.
    #[error("revision conflict: entry no longer at revision {expected}")]
    RevisionConflict { expected: i64 },

    /// The modify operation itself failed. Terminal, with no fallthrough:
    /// only unreachable servers are worth trying elsewhere.
    #[error("modify against {endpoint} failed: {source}")]
    WriteFailed {
        endpoint: DirectoryEndpoint,
        #[source]
        source: Source,
    },

    /// Every configured endpoint was unreachable.
    #[error("all {attempted} directory endpoints unreachable")]
    AllEndpointsUnreachable { attempted: usize },
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
