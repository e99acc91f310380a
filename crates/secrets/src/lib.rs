//! Reversible codec for secrets held in the shared config store.
//!
//! The provisioning side stores the directory bind password (and a handful of
//! other values) as base64-wrapped 3-key triple-DES/ECB ciphertext, keyed by
//! the deployment's stored salt. This crate implements that transform and its
//! inverse so the rotation daemon can recover the plaintext at runtime.
//!
//! The scheme is deliberately unchanged from what the provisioning tooling
//! writes: ECB, zero IV, PKCS#7 block padding, no integrity check. A
//! corrupted-but-well-formed ciphertext decrypts to garbage rather than an
//! error. Callers only ever see [`encrypt`] and [`decrypt`], so a stronger
//! authenticated codec can be substituted behind the same signatures once the
//! stored values migrate.

mod codec;
mod error;

pub use codec::{decrypt, decrypt_to_string, encrypt};
pub use error::{CodecError, CodecResult};
