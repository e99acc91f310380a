//! Connection seam between the updater and the wire protocol.
//!
//! The updater only sees [`DirectoryConnector`] and [`DirectorySession`];
//! the `ldap3`-backed implementation lives here, and tests script the same
//! seam with an in-memory fake.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use secrecy::{ExposeSecret, SecretString};

use crate::ber::revision_assertion;
use crate::endpoint::DirectoryEndpoint;
use crate::entry::{ATTR_DYNAMIC_CONF, ATTR_REVISION, ATTR_WEB_KEYS, EntryUpdate, ServiceConfigEntry};
use crate::error::{DirectoryError, DirectoryResult};

/// Well-known administrative bind identity.
pub const DIRECTORY_MANAGER_DN: &str = "cn=directory manager,o=gluu";

/// resultCode noSuchObject (RFC 4511).
const RC_NO_SUCH_OBJECT: u32 = 32;
/// resultCode assertionFailed (RFC 4528).
const RC_ASSERTION_FAILED: u32 = 122;

/// Bind identity and password for one directory session. The password lives
/// only as long as the cycle that decrypted it.
#[derive(Debug, Clone)]
pub struct BindCredentials {
    pub bind_dn: String,
    pub password: SecretString,
}

impl BindCredentials {
    /// Credentials for the well-known directory manager identity.
    pub fn directory_manager(password: SecretString) -> Self {
        Self {
            bind_dn: DIRECTORY_MANAGER_DN.into(),
            password,
        }
    }
}

/// An authenticated session against one directory server.
#[async_trait]
pub trait DirectorySession: Send {
    /// Base-scope read of the configuration entry.
    async fn read_config_entry(&mut self, base_dn: &str) -> DirectoryResult<ServiceConfigEntry>;

    /// Single modify replacing the three owned attributes, conditional on
    /// the entry still being at `expected_revision`.
    async fn apply_update(
        &mut self,
        dn: &str,
        expected_revision: i64,
        update: &EntryUpdate,
    ) -> DirectoryResult<()>;

    /// Best-effort unbind.
    async fn close(&mut self);
}

/// Opens authenticated sessions. Connect and bind failures are always
/// [`DirectoryError::EndpointUnreachable`].
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        credentials: &BindCredentials,
    ) -> DirectoryResult<Box<dyn DirectorySession>>;
}

/// Transport options for the real connector.
#[derive(Debug, Clone)]
pub struct LdapConnectorConfig {
    pub conn_timeout: Duration,
    /// Upgrade the connection with StartTLS before binding.
    pub starttls: bool,
}

impl Default for LdapConnectorConfig {
    fn default() -> Self {
        Self {
            conn_timeout: Duration::from_secs(10),
            starttls: false,
        }
    }
}

/// `ldap3`-backed connector.
#[derive(Debug, Clone, Default)]
pub struct LdapConnector {
    config: LdapConnectorConfig,
}

impl LdapConnector {
    pub fn new(config: LdapConnectorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        credentials: &BindCredentials,
    ) -> DirectoryResult<Box<dyn DirectorySession>> {
        let unreachable = |source: LdapError| DirectoryError::EndpointUnreachable {
            endpoint: endpoint.clone(),
            source: source.into(),
        };

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.conn_timeout)
            .set_starttls(self.config.starttls);
        let url = format!("ldap://{endpoint}");
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(unreachable)?;
        ldap3::drive!(conn);

        ldap.simple_bind(&credentials.bind_dn, credentials.password.expose_secret())
            .await
            .and_then(ldap3::LdapResult::success)
            .map_err(unreachable)?;

        Ok(Box::new(LdapSession {
            ldap,
            endpoint: endpoint.clone(),
        }))
    }
}

struct LdapSession {
    ldap: ldap3::Ldap,
    endpoint: DirectoryEndpoint,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn read_config_entry(&mut self, base_dn: &str) -> DirectoryResult<ServiceConfigEntry> {
        let outcome = self
            .ldap
            .search(
                base_dn,
                Scope::Base,
                "(objectClass=*)",
                vec![ATTR_REVISION, ATTR_WEB_KEYS, ATTR_DYNAMIC_CONF],
            )
            .await
            .and_then(ldap3::SearchResult::success);

        let entries = match outcome {
            Ok((entries, _)) => entries,
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => {
                return Err(DirectoryError::EntryNotFound {
                    base_dn: base_dn.to_owned(),
                });
            }
            // Protocol-level refusal: terminal for the call.
            Err(source @ LdapError::LdapResult { .. }) => {
                return Err(DirectoryError::ReadFailed {
                    endpoint: self.endpoint.clone(),
                    source: source.into(),
                });
            }
            // Transport drop mid-session: the server went away, fail over.
            Err(source) => {
                return Err(DirectoryError::EndpointUnreachable {
                    endpoint: self.endpoint.clone(),
                    source: source.into(),
                });
            }
        };

        let Some(first) = entries.into_iter().next() else {
            return Err(DirectoryError::EntryNotFound {
                base_dn: base_dn.to_owned(),
            });
        };
        let entry = SearchEntry::construct(first);
        ServiceConfigEntry::from_attrs(entry.dn, &entry.attrs)
    }

    async fn apply_update(
        &mut self,
        dn: &str,
        expected_revision: i64,
        update: &EntryUpdate,
    ) -> DirectoryResult<()> {
        let mods = vec![
            Mod::Replace(
                ATTR_REVISION.to_owned(),
                HashSet::from([update.revision.to_string()]),
            ),
            Mod::Replace(
                ATTR_WEB_KEYS.to_owned(),
                HashSet::from([update.web_keys_json.clone()]),
            ),
            Mod::Replace(
                ATTR_DYNAMIC_CONF.to_owned(),
                HashSet::from([update.dynamic_conf_json.clone()]),
            ),
        ];

        let outcome = self
            .ldap
            .with_controls(revision_assertion(expected_revision))
            .modify(dn, mods)
            .await
            .and_then(ldap3::LdapResult::success);

        match outcome {
            Ok(_) => Ok(()),
            Err(LdapError::LdapResult { result }) if result.rc == RC_ASSERTION_FAILED => {
                Err(DirectoryError::RevisionConflict {
                    expected: expected_revision,
                })
            }
            Err(source) => Err(DirectoryError::WriteFailed {
                endpoint: self.endpoint.clone(),
                source: source.into(),
            }),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "unbind failed");
        }
    }
}
