//! Scripted in-memory directory for tests.
//!
//! Implements the [`DirectoryConnector`] seam with per-endpoint scripts so
//! failover behavior can be exercised without a directory server. Available
//! to other crates behind the `test-util` feature.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::endpoint::DirectoryEndpoint;
use crate::entry::{
    ATTR_DYNAMIC_CONF, ATTR_REVISION, ATTR_WEB_KEYS, EntryUpdate, ServiceConfigEntry,
};
use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{BindCredentials, DirectoryConnector, DirectorySession};

/// What an endpoint answers to the base-scope read.
#[derive(Debug, Clone)]
pub enum ReadBehavior {
    /// Serve the scripted entry.
    Entry(ScriptedEntry),
    /// The entry does not exist on this server.
    Missing,
    /// The connection drops once the read is attempted.
    Drop,
}

/// What an endpoint does with the modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehavior {
    Accept,
    /// The revision assertion does not hold.
    Conflict,
    /// The modify is refused outright.
    Fail,
}

/// Directory entry state served by a scripted endpoint.
#[derive(Debug, Clone)]
pub struct ScriptedEntry {
    pub revision: i64,
    pub web_keys: Value,
    pub dynamic_conf: Value,
}

impl ScriptedEntry {
    /// An entry with plausible existing content at the given revision.
    pub fn at_revision(revision: i64) -> Self {
        Self {
            revision,
            web_keys: json!({
                "keys": [{"kid": "previous-generation"}],
                "keyStoreFile": "/etc/certs/oxauth-keys.jks",
            }),
            dynamic_conf: json!({
                "issuer": "https://idp.example.org",
                "keyRegenerationEnabled": true,
            }),
        }
    }
}

/// One endpoint's script.
#[derive(Debug, Clone)]
pub struct ScriptedEndpoint {
    pub reachable: bool,
    pub read: ReadBehavior,
    pub write: WriteBehavior,
}

impl ScriptedEndpoint {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            read: ReadBehavior::Missing,
            write: WriteBehavior::Accept,
        }
    }

    pub fn missing_entry() -> Self {
        Self {
            reachable: true,
            read: ReadBehavior::Missing,
            write: WriteBehavior::Accept,
        }
    }

    pub fn serving(entry: ScriptedEntry) -> Self {
        Self {
            reachable: true,
            read: ReadBehavior::Entry(entry),
            write: WriteBehavior::Accept,
        }
    }

    pub fn dropping_reads() -> Self {
        Self {
            reachable: true,
            read: ReadBehavior::Drop,
            write: WriteBehavior::Accept,
        }
    }

    pub fn with_write(mut self, write: WriteBehavior) -> Self {
        self.write = write;
        self
    }
}

#[derive(Debug, Default)]
struct State {
    endpoints: HashMap<DirectoryEndpoint, ScriptedEndpoint>,
    connects: Vec<DirectoryEndpoint>,
    writes: Vec<(DirectoryEndpoint, i64, EntryUpdate)>,
}

/// Scripted connector. Clones share state, so a test can keep a handle for
/// assertions while the updater owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDirectory {
    state: Arc<Mutex<State>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self, endpoint: DirectoryEndpoint, script: ScriptedEndpoint) -> Self {
        self.state
            .lock()
            .expect("scripted directory lock")
            .endpoints
            .insert(endpoint, script);
        self.clone()
    }

    /// Endpoints that saw a connection attempt, in order.
    pub fn connect_attempts(&self) -> Vec<DirectoryEndpoint> {
        self.state
            .lock()
            .expect("scripted directory lock")
            .connects
            .clone()
    }

    /// Modifies that reached a server: `(endpoint, asserted revision, update)`.
    pub fn writes(&self) -> Vec<(DirectoryEndpoint, i64, EntryUpdate)> {
        self.state
            .lock()
            .expect("scripted directory lock")
            .writes
            .clone()
    }
}

#[async_trait]
impl DirectoryConnector for ScriptedDirectory {
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        _credentials: &BindCredentials,
    ) -> DirectoryResult<Box<dyn DirectorySession>> {
        let script = {
            let mut state = self.state.lock().expect("scripted directory lock");
            state.connects.push(endpoint.clone());
            state.endpoints.get(endpoint).cloned()
        };
        let script = script.unwrap_or_else(ScriptedEndpoint::unreachable);
        if !script.reachable {
            return Err(DirectoryError::EndpointUnreachable {
                endpoint: endpoint.clone(),
                source: "scripted: connection refused".into(),
            });
        }
        Ok(Box::new(ScriptedSession {
            endpoint: endpoint.clone(),
            script,
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedSession {
    endpoint: DirectoryEndpoint,
    script: ScriptedEndpoint,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl DirectorySession for ScriptedSession {
    async fn read_config_entry(&mut self, base_dn: &str) -> DirectoryResult<ServiceConfigEntry> {
        match &self.script.read {
            ReadBehavior::Missing => Err(DirectoryError::EntryNotFound {
                base_dn: base_dn.to_owned(),
            }),
            ReadBehavior::Drop => Err(DirectoryError::EndpointUnreachable {
                endpoint: self.endpoint.clone(),
                source: "scripted: connection reset during search".into(),
            }),
            ReadBehavior::Entry(entry) => {
                // Round-trip through the real attribute parser.
                let attrs = HashMap::from([
                    (ATTR_REVISION.to_owned(), vec![entry.revision.to_string()]),
                    (ATTR_WEB_KEYS.to_owned(), vec![entry.web_keys.to_string()]),
                    (
                        ATTR_DYNAMIC_CONF.to_owned(),
                        vec![entry.dynamic_conf.to_string()],
                    ),
                ]);
                ServiceConfigEntry::from_attrs(base_dn.to_owned(), &attrs)
            }
        }
    }

    async fn apply_update(
        &mut self,
        _dn: &str,
        expected_revision: i64,
        update: &EntryUpdate,
    ) -> DirectoryResult<()> {
        self.state
            .lock()
            .expect("scripted directory lock")
            .writes
            .push((self.endpoint.clone(), expected_revision, update.clone()));
        match self.script.write {
            WriteBehavior::Accept => Ok(()),
            WriteBehavior::Conflict => Err(DirectoryError::RevisionConflict {
                expected: expected_revision,
            }),
            WriteBehavior::Fail => Err(DirectoryError::WriteFailed {
                endpoint: self.endpoint.clone(),
                source: "scripted: unwilling to perform".into(),
            }),
        }
    }

    async fn close(&mut self) {}
}
