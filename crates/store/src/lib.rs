//! Typed client for the shared key/value config store.
//!
//! The deployment keeps generated secrets, connection parameters and rotation
//! bookkeeping in a Consul-style KV store; the provisioning side writes them,
//! this daemon reads them back and owns exactly one key (`key_rotated_at`).
//!
//! Writes to that key go through [`KvStore::put_cas`], a conditional PUT
//! keyed on the entry's observed `ModifyIndex`, so two coordinator instances
//! cannot silently overwrite each other's rotation bookkeeping.

mod client;
mod error;

pub use client::{KvEntry, KvStore, KvStoreConfig};
pub use error::{StoreError, StoreResult};

/// KV keys consumed by the rotation daemon. The provisioning collaborators
/// own every key except [`keys::KEY_ROTATED_AT`].
pub mod keys {
    /// Keystore password for key generation.
    pub const OPENID_JKS_PASS: &str = "oxauth_openid_jks_pass";
    /// Keystore file path handed to the key-generation tool.
    pub const OPENID_JKS_FN: &str = "oxauth_openid_jks_fn";
    /// Distinguished name baked into generated keys.
    pub const OPENID_JKS_DN_NAME: &str = "default_openid_jks_dn_name";
    /// Encrypted directory bind password.
    pub const ENCODED_OX_LDAP_PW: &str = "encoded_ox_ldap_pw";
    /// Decryption key for stored secrets.
    pub const ENCODED_SALT: &str = "encoded_salt";
    /// Appliance identifier used to build the directory base DN.
    pub const INUM_APPLIANCE: &str = "inumAppliance";
    /// Unix timestamp of the last confirmed rotation. Written by this daemon.
    pub const KEY_ROTATED_AT: &str = "key_rotated_at";
}
