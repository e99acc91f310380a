//! Key-generation error types.

use std::process::ExitStatus;

use thiserror::Error;

/// Errors from one key-generation attempt.
///
/// Every variant is recoverable at the cycle boundary: the coordinator logs
/// it and retries the whole rotation on the next scheduled tick with no state
/// mutated.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The tool ran and reported failure; `stderr` carries its diagnostics.
    #[error("key-generation tool failed with {status}: {stderr}")]
    ProcessFailed { status: ExitStatus, stderr: String },

    /// The tool exited cleanly but its stdout is not the expected payload.
    #[error("key-generation tool produced malformed output: {reason}")]
    MalformedOutput { reason: String },

    /// The tool could not be started at all.
    #[error("could not spawn key-generation tool")]
    Spawn(#[from] std::io::Error),

    /// The tool exceeded its time budget and was killed.
    #[error("key-generation tool timed out after {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },
}

/// Result type for key-generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;
