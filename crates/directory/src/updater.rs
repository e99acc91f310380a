//! Ordered-failover propagation of a freshly generated key set.

use serde_json::Value;

use crate::endpoint::DirectoryEndpoint;
use crate::entry::DynamicSettings;
use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{BindCredentials, DirectoryConnector};

/// Everything one propagation call needs. Built fresh each cycle from the
/// config store, so credential and appliance changes take effect without a
/// restart.
#[derive(Debug)]
pub struct UpdateRequest {
    pub base_dn: String,
    pub credentials: BindCredentials,
    /// Ordered JWK-like records, published verbatim as the new `keys` field.
    pub keys: Vec<Value>,
    pub settings: DynamicSettings,
}

/// Proof of a committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub endpoint: DirectoryEndpoint,
    /// Revision the entry now carries.
    pub revision: i64,
}

/// Walks the endpoint list in priority order and commits against the first
/// server that can serve the entry.
#[derive(Debug)]
pub struct ConfigUpdater<C> {
    connector: C,
    endpoints: Vec<DirectoryEndpoint>,
}

impl<C: DirectoryConnector> ConfigUpdater<C> {
    pub fn new(connector: C, endpoints: Vec<DirectoryEndpoint>) -> Self {
        Self {
            connector,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &[DirectoryEndpoint] {
        &self.endpoints
    }

    /// Read-modify-write the configuration entry on the first reachable
    /// endpoint.
    ///
    /// Unreachable servers (at connect, bind, or during the read) advance
    /// the walk; a missing entry, malformed content, revision conflict or
    /// failed write ends the call. See the crate docs for why those never
    /// fall through.
    pub async fn propagate(&self, request: &UpdateRequest) -> DirectoryResult<UpdateReport> {
        for endpoint in &self.endpoints {
            let mut session = match self.connector.connect(endpoint, &request.credentials).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "directory server unreachable, trying next");
                    continue;
                }
            };

            let entry = match session.read_config_entry(&request.base_dn).await {
                Ok(entry) => entry,
                Err(e @ DirectoryError::EndpointUnreachable { .. }) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "lost directory server during read, trying next");
                    session.close().await;
                    continue;
                }
                Err(e) => {
                    session.close().await;
                    return Err(e);
                }
            };

            let update = entry.next_version(&request.keys, &request.settings);
            let outcome = session
                .apply_update(&entry.dn, entry.revision, &update)
                .await;
            session.close().await;

            return outcome.map(|()| {
                tracing::info!(
                    endpoint = %endpoint,
                    revision = update.revision,
                    keys = request.keys.len(),
                    "configuration entry updated"
                );
                UpdateReport {
                    endpoint: endpoint.clone(),
                    revision: update.revision,
                }
            });
        }

        Err(DirectoryError::AllEndpointsUnreachable {
            attempted: self.endpoints.len(),
        })
    }
}
