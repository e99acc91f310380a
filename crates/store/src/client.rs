//! HTTP client for the Consul-style KV API.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{StoreError, StoreResult};

/// Connection parameters for the KV store.
#[derive(Debug, Clone)]
pub struct KvStoreConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8500,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One stored value together with the revision the store knows it under.
///
/// `modify_index` is what [`KvStore::put_cas`] conditions on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub value: String,
    pub modify_index: u64,
}

/// Wire envelope of the KV read endpoint.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "Value")]
    value: Option<String>,
    #[serde(rename = "ModifyIndex")]
    modify_index: u64,
}

/// Client for the shared config store.
#[derive(Debug, Clone)]
pub struct KvStore {
    http: reqwest::Client,
    base: String,
}

impl KvStore {
    pub fn new(config: &KvStoreConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base: format!("http://{}:{}/v1/kv", config.host, config.port),
        })
    }

    /// Read a key together with its modify index. `None` if the key is absent.
    pub async fn get_entry(&self, key: &str) -> StoreResult<Option<KvEntry>> {
        let response = self.http.get(format!("{}/{key}", self.base)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => {
                let envelope: Vec<RawEntry> =
                    response.json().await.map_err(|e| StoreError::Decode {
                        key: key.to_owned(),
                        reason: e.to_string(),
                    })?;
                let raw = envelope.into_iter().next().ok_or_else(|| StoreError::Decode {
                    key: key.to_owned(),
                    reason: "empty response envelope".into(),
                })?;
                Ok(Some(KvEntry {
                    value: decode_value(key, raw.value.as_deref())?,
                    modify_index: raw.modify_index,
                }))
            }
            status => Err(StoreError::UnexpectedStatus {
                key: key.to_owned(),
                status,
            }),
        }
    }

    /// Read a key's value. `None` if the key is absent.
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    /// Read a key the daemon cannot run without.
    pub async fn require(&self, key: &str) -> StoreResult<String> {
        self.get(key).await?.ok_or_else(|| StoreError::KeyMissing {
            key: key.to_owned(),
        })
    }

    /// Unconditional write.
    pub async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let response = self
            .http
            .put(format!("{}/{key}", self.base))
            .body(value.to_owned())
            .send()
            .await?;
        self.expect_ok(key, response).await?;
        Ok(())
    }

    /// Conditional write on the entry's modify index.
    ///
    /// `index` 0 means "only create": the store's check-and-set treats a
    /// zero index as "the key must not exist yet". Returns whether the store
    /// accepted the write; `false` means another writer got there first.
    pub async fn put_cas(&self, key: &str, value: &str, index: u64) -> StoreResult<bool> {
        let response = self
            .http
            .put(format!("{}/{key}?cas={index}", self.base))
            .body(value.to_owned())
            .send()
            .await?;
        let committed: bool = self.expect_ok(key, response).await?;
        if !committed {
            tracing::warn!(key, index, "conditional store write rejected");
        }
        Ok(committed)
    }

    async fn expect_ok(&self, key: &str, response: reqwest::Response) -> StoreResult<bool> {
        if response.status() != StatusCode::OK {
            return Err(StoreError::UnexpectedStatus {
                key: key.to_owned(),
                status: response.status(),
            });
        }
        response.json().await.map_err(|e| StoreError::Decode {
            key: key.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Values come back base64-wrapped; a JSON `null` stands for an empty value.
fn decode_value(key: &str, value: Option<&str>) -> StoreResult<String> {
    let Some(encoded) = value else {
        return Ok(String::new());
    };
    let bytes = BASE64.decode(encoded).map_err(|e| StoreError::Decode {
        key: key.to_owned(),
        reason: format!("invalid base64 value: {e}"),
    })?;
    String::from_utf8(bytes).map_err(|e| StoreError::Decode {
        key: key.to_owned(),
        reason: format!("value is not UTF-8: {e}"),
    })
}
