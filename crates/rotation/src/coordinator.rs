//! One rotation cycle, and the loop that schedules it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use keyrot_directory::{
    BindCredentials, ConfigUpdater, DirectoryConnector, DynamicSettings, UpdateReport,
    UpdateRequest, oxauth_config_dn,
};
use keyrot_keygen::{KeygenRequest, KeygenTool};
use keyrot_store::{KvStore, keys};

use crate::error::RotationResult;
use crate::policy::RotationPolicy;

/// How one cycle ended, when it ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Rotation is not due yet; nothing was touched.
    NotDue,
    /// Keys rotated, directory committed, bookkeeping advanced.
    Rotated {
        report: UpdateReport,
        rotated_at: i64,
    },
    /// Directory committed, but another coordinator instance advanced the
    /// bookkeeping first; local state was left alone.
    BookkeepingRaced { report: UpdateReport },
}

/// Drives the full rotate-and-propagate pipeline.
pub struct Coordinator<C> {
    store: KvStore,
    keygen: KeygenTool,
    updater: ConfigUpdater<C>,
    policy: RotationPolicy,
}

impl<C: DirectoryConnector> Coordinator<C> {
    pub fn new(
        store: KvStore,
        keygen: KeygenTool,
        updater: ConfigUpdater<C>,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            store,
            keygen,
            updater,
            policy,
        }
    }

    /// Poll until shutdown. Each tick runs one cycle to completion; the
    /// token is only consulted between cycles, so an in-flight directory
    /// write is never abandoned halfway.
    pub async fn run(&self, poll_interval: Duration, shutdown: CancellationToken) {
        loop {
            tracing::info!("checking whether keys should be rotated");
            match self.run_cycle(Utc::now()).await {
                Ok(CycleOutcome::NotDue) => {
                    tracing::info!("no need to rotate keys at the moment");
                }
                Ok(CycleOutcome::Rotated { report, rotated_at }) => {
                    tracing::info!(
                        endpoint = %report.endpoint,
                        revision = report.revision,
                        rotated_at,
                        "keys have been rotated"
                    );
                }
                Ok(CycleOutcome::BookkeepingRaced { report }) => {
                    tracing::warn!(
                        endpoint = %report.endpoint,
                        revision = report.revision,
                        "keys rotated but another coordinator advanced the bookkeeping"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "rotation cycle failed; will retry next tick");
                }
            }

            tokio::select! {
                () = tokio::time::sleep(jittered(poll_interval)) => {}
                () = shutdown.cancelled() => {
                    tracing::info!("shutdown requested; rotation loop stopping");
                    return;
                }
            }
        }
    }

    /// Run a single cycle against the clock value `now`.
    ///
    /// Nothing is mutated unless the directory commit succeeded; any error
    /// simply ends the cycle and the next tick starts over, key generation
    /// included.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> RotationResult<CycleOutcome> {
        let bookkeeping = self.store.get_entry(keys::KEY_ROTATED_AT).await?;
        let cas_index = bookkeeping.as_ref().map_or(0, |entry| entry.modify_index);
        let last_rotated_at = bookkeeping.as_ref().and_then(|entry| {
            entry.value.trim().parse::<i64>().map_or_else(
                |_| {
                    tracing::warn!(
                        value = %entry.value,
                        "stored rotation timestamp is not a number; treating keys as never rotated"
                    );
                    None
                },
                Some,
            )
        });

        if !self.policy.is_due(last_rotated_at, now) {
            return Ok(CycleOutcome::NotDue);
        }

        let keystore_password = self.store.require(keys::OPENID_JKS_PASS).await?;
        let keystore_path = self.store.require(keys::OPENID_JKS_FN).await?;
        let dn_name = self.store.require(keys::OPENID_JKS_DN_NAME).await?;
        let encoded_bind_pw = self.store.require(keys::ENCODED_OX_LDAP_PW).await?;
        let salt = self.store.require(keys::ENCODED_SALT).await?;
        let inum_appliance = self.store.require(keys::INUM_APPLIANCE).await?;

        let bind_password = keyrot_secrets::decrypt_to_string(&encoded_bind_pw, &salt)?;

        let request = KeygenRequest::new(
            SecretString::from(keystore_password.clone()),
            keystore_path,
            dn_name,
        );
        let new_keys = self.keygen.generate(&request).await?;

        let report = self
            .updater
            .propagate(&UpdateRequest {
                base_dn: oxauth_config_dn(&inum_appliance),
                credentials: BindCredentials::directory_manager(SecretString::from(bind_password)),
                keys: new_keys,
                settings: DynamicSettings {
                    rotation_interval_days: self.policy.interval_days(),
                    keystore_secret: keystore_password,
                },
            })
            .await?;

        let rotated_at = now.timestamp();
        let committed = self
            .store
            .put_cas(keys::KEY_ROTATED_AT, &rotated_at.to_string(), cas_index)
            .await?;

        if committed {
            Ok(CycleOutcome::Rotated { report, rotated_at })
        } else {
            Ok(CycleOutcome::BookkeepingRaced { report })
        }
    }
}

/// ±10% jitter so restarts across a fleet don't tick in lockstep.
fn jittered(base: Duration) -> Duration {
    use rand::Rng;

    let base_secs = base.as_secs_f64();
    let jittered_secs = rand::rng().random_range(base_secs * 0.9..=base_secs * 1.1);
    Duration::from_secs_f64(jittered_secs)
}
