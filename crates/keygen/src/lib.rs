//! Invocation contract for the external key-generation tool.
//!
//! Signing-key material is produced by an opaque Java tool; this crate owns
//! the argv shape, the bounded-time process invocation, and the parsing of
//! the tool's stdout payload into an ordered set of JWK-like records. The
//! records themselves stay opaque (`serde_json::Value`): the daemon
//! publishes them verbatim and must not invent a schema the tool does not
//! guarantee.
//!
//! The keystore file the tool writes to disk is a side effect the daemon
//! never validates beyond the parsed public keys.

mod error;
mod tool;

pub use error::{GenerationError, GenerationResult};
pub use tool::{KeySet, KeygenRequest, KeygenTool, KeygenToolConfig, DEFAULT_ALGORITHMS};
