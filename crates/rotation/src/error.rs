//! Cycle-level error type.
//!
//! Every underlying failure ends the current cycle without touching the
//! rotation bookkeeping; the loop logs it and retries the whole cycle,
//! generation included, on the next tick.

use thiserror::Error;

/// Anything that can end a rotation cycle early.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Store(#[from] keyrot_store::StoreError),

    #[error(transparent)]
    Codec(#[from] keyrot_secrets::CodecError),

    #[error(transparent)]
    Generation(#[from] keyrot_keygen::GenerationError),

    #[error(transparent)]
    Directory(#[from] keyrot_directory::DirectoryError),
}

/// Result type for rotation operations.
pub type RotationResult<T> = Result<T, RotationError>;
