//! `keyrotd`: OpenID signing-key rotation daemon.
//!
//! Reads its configuration from the environment (or flags), wires the
//! config-store client, key-generation tool and directory updater into the
//! rotation coordinator, and polls until SIGINT/SIGTERM. Shutdown waits for
//! the in-flight cycle: the directory entry is never left half-updated.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use keyrot_directory::{ConfigUpdater, LdapConnector, LdapConnectorConfig, parse_endpoint_list};
use keyrot_keygen::{KeygenTool, KeygenToolConfig};
use keyrot_rotation::{Coordinator, RotationPolicy};
use keyrot_store::{KvStore, KvStoreConfig};

#[derive(Debug, Parser)]
#[command(name = "keyrotd", version, about = "OpenID signing-key rotation daemon")]
struct Args {
    /// Config store host.
    #[arg(long, env = "GLUU_KV_HOST", default_value = "localhost")]
    kv_host: String,

    /// Config store port.
    #[arg(long, env = "GLUU_KV_PORT", default_value_t = 8500)]
    kv_port: u16,

    /// Comma-separated directory endpoints (host:port); the first is the
    /// primary and is tried first on every cycle.
    #[arg(long, env = "GLUU_LDAP_URL", default_value = "localhost:1389")]
    ldap_url: String,

    /// Upgrade directory connections with StartTLS before binding.
    #[arg(long, env = "GLUU_LDAP_STARTTLS")]
    ldap_starttls: bool,

    /// Days between key rotations.
    #[arg(long, env = "GLUU_KEY_ROTATION_INTERVAL", default_value_t = 2)]
    rotation_interval: u32,

    /// Java binary used to run the key-generation tool.
    #[arg(long, env = "GLUU_KEYGEN_JAVA_BIN", default_value = "java")]
    keygen_java_bin: PathBuf,

    /// Path to the key-generation jar.
    #[arg(
        long,
        env = "GLUU_KEYGEN_JAR",
        default_value = "/opt/key-rotation/javalibs/keygen.jar"
    )]
    keygen_jar: PathBuf,

    /// Time budget for one key-generation run, in seconds.
    #[arg(long, env = "GLUU_KEYGEN_TIMEOUT_SECS", default_value_t = 120)]
    keygen_timeout_secs: u64,

    /// Seconds between rotation-due checks.
    #[arg(long, env = "GLUU_POLL_INTERVAL_SECS", default_value_t = 30)]
    poll_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let endpoints =
        parse_endpoint_list(&args.ldap_url).context("invalid GLUU_LDAP_URL endpoint list")?;
    tracing::info!(
        endpoints = ?endpoints.iter().map(ToString::to_string).collect::<Vec<_>>(),
        interval_days = args.rotation_interval,
        "starting key-rotation daemon"
    );

    let store = KvStore::new(&KvStoreConfig {
        host: args.kv_host,
        port: args.kv_port,
        ..KvStoreConfig::default()
    })
    .context("building config store client")?;

    let keygen = KeygenTool::new(KeygenToolConfig {
        java_bin: args.keygen_java_bin,
        jar_path: args.keygen_jar,
        timeout: Duration::from_secs(args.keygen_timeout_secs),
    });

    let updater = ConfigUpdater::new(
        LdapConnector::new(LdapConnectorConfig {
            starttls: args.ldap_starttls,
            ..LdapConnectorConfig::default()
        }),
        endpoints,
    );

    let coordinator = Coordinator::new(
        store,
        keygen,
        updater,
        RotationPolicy::new(args.rotation_interval),
    );

    let shutdown = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = sigint.recv() => tracing::info!(signal = "SIGINT", "shutdown signal received"),
                _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "shutdown signal received"),
            }
            shutdown.cancel();
        }
    });

    coordinator
        .run(Duration::from_secs(args.poll_interval_secs), shutdown)
        .await;
    Ok(())
}
