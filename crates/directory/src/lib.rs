//! Failover-aware updater for the service's directory configuration entry.
//!
//! A deployment runs one or more directory servers holding the OpenID
//! provider's configuration entry. Each rotation cycle this crate walks the
//! configured endpoints in priority order, reads the entry from the first
//! server that answers, and writes back the new public-key set, the merged
//! dynamic settings and a bumped revision counter in a single modify
//! operation.
//!
//! Failure classes are deliberately distinct:
//!
//! - a server that cannot be reached or bound advances the walk to the next
//!   endpoint;
//! - a missing entry aborts the whole call: that is a provisioning fault,
//!   and retrying other replicas is assumed not to help;
//! - a failed write aborts the whole call: retrying a write on another
//!   replica after a successful read risks double application.
//!
//! The modify is guarded by an RFC 4528 Assertion control on the revision
//! value observed during the read, so a concurrent writer turns the
//! read-increment-write into a detected [`DirectoryError::RevisionConflict`]
//! instead of a silently lost update.

mod ber;
mod endpoint;
mod entry;
mod error;
mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
mod updater;

pub use endpoint::{DirectoryEndpoint, EndpointParseError, parse_endpoint_list};
pub use entry::{
    ATTR_DYNAMIC_CONF, ATTR_REVISION, ATTR_WEB_KEYS, DynamicSettings, EntryUpdate,
    ServiceConfigEntry, oxauth_config_dn,
};
pub use error::{DirectoryError, DirectoryResult};
pub use session::{
    BindCredentials, DIRECTORY_MANAGER_DN, DirectoryConnector, DirectorySession, LdapConnector,
    LdapConnectorConfig,
};
pub use updater::{ConfigUpdater, UpdateReport, UpdateRequest};
