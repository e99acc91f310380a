//! The service configuration entry and its rewrite rules.
//!
//! The entry mutation is pure code: parse the two JSON blob attributes,
//! replace the web-keys `keys` field, merge the fixed dynamic-conf policy
//! fields, bump the revision. Every field the updater does not own is
//! preserved verbatim.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::error::{DirectoryError, DirectoryResult};

/// Monotonic revision counter, incremented by exactly 1 on every successful
/// write.
pub const ATTR_REVISION: &str = "oxRevision";
/// Serialized web-keys configuration; its `keys` field is the published set.
pub const ATTR_WEB_KEYS: &str = "oxAuthConfWebKeys";
/// Serialized dynamic configuration blob.
pub const ATTR_DYNAMIC_CONF: &str = "oxAuthConfDynamic";

/// Base DN of the configuration entry for a given appliance identifier.
pub fn oxauth_config_dn(inum_appliance: &str) -> String {
    format!("ou=oxauth,ou=configuration,inum={inum_appliance},ou=appliances,o=gluu")
}

/// Values merged into the dynamic-conf blob on every rotation.
#[derive(Debug, Clone)]
pub struct DynamicSettings {
    pub rotation_interval_days: u32,
    /// Keystore password republished so the service can open the keystore
    /// the generation tool just wrote.
    pub keystore_secret: String,
}

/// Snapshot of the configuration entry as read from a directory server.
#[derive(Debug, Clone)]
pub struct ServiceConfigEntry {
    pub dn: String,
    pub revision: i64,
    web_keys: Map<String, Value>,
    dynamic_conf: Map<String, Value>,
}

/// The three attribute values written back by one rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUpdate {
    pub revision: i64,
    pub web_keys_json: String,
    pub dynamic_conf_json: String,
}

impl ServiceConfigEntry {
    /// Build a snapshot from a search result's attribute map.
    pub fn from_attrs(dn: String, attrs: &HashMap<String, Vec<String>>) -> DirectoryResult<Self> {
        let revision_raw = first_value(attrs, ATTR_REVISION)?;
        let revision = revision_raw
            .trim()
            .parse()
            .map_err(|_| DirectoryError::MalformedEntry {
                attribute: ATTR_REVISION,
                reason: format!("not an integer: {revision_raw:?}"),
            })?;
        Ok(Self {
            dn,
            revision,
            web_keys: parse_object(attrs, ATTR_WEB_KEYS)?,
            dynamic_conf: parse_object(attrs, ATTR_DYNAMIC_CONF)?,
        })
    }

    /// Produce the next version of the entry with `keys` replaced by the
    /// freshly generated set and the rotation policy fields pinned.
    pub fn next_version(&self, keys: &[Value], settings: &DynamicSettings) -> EntryUpdate {
        let mut web_keys = self.web_keys.clone();
        web_keys.insert("keys".into(), Value::Array(keys.to_vec()));

        let mut dynamic_conf = self.dynamic_conf.clone();
        // The daemon owns rotation now; the service's own regeneration stays off.
        dynamic_conf.insert("keyRegenerationEnabled".into(), json!(false));
        dynamic_conf.insert(
            "keyRegenerationInterval".into(),
            json!(settings.rotation_interval_days * 24),
        );
        dynamic_conf.insert("defaultSignatureAlgorithm".into(), json!("RS512"));
        dynamic_conf.insert("webKeysStorage".into(), json!("keystore"));
        dynamic_conf.insert("keyStoreSecret".into(), json!(settings.keystore_secret));

        EntryUpdate {
            revision: self.revision + 1,
            web_keys_json: Value::Object(web_keys).to_string(),
            dynamic_conf_json: Value::Object(dynamic_conf).to_string(),
        }
    }
}

fn first_value<'a>(
    attrs: &'a HashMap<String, Vec<String>>,
    attribute: &'static str,
) -> DirectoryResult<&'a str> {
    attrs
        .get(attribute)
        .and_then(|values| values.first())
        .map(String::as_str)
        .ok_or(DirectoryError::MalformedEntry {
            attribute,
            reason: "attribute absent".into(),
        })
}

fn parse_object(
    attrs: &HashMap<String, Vec<String>>,
    attribute: &'static str,
) -> DirectoryResult<Map<String, Value>> {
    let raw = first_value(attrs, attribute)?;
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DirectoryError::MalformedEntry {
            attribute,
            reason: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(DirectoryError::MalformedEntry {
            attribute,
            reason: e.to_string(),
        }),
    }
}
