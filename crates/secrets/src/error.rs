//! Codec error types.

use thiserror::Error;

/// Errors produced by the secret codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input is not something the block cipher could ever have produced:
    /// bad base64, a length that is not a whole number of cipher blocks, or
    /// padding bytes no encryptor would emit.
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext { reason: String },

    /// Triple-DES requires exactly 24 key bytes.
    #[error("invalid codec key length: expected 24 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    /// Decrypted bytes were expected to be text but are not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
