//! Bounded-time invocation of the keygen tool.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{GenerationError, GenerationResult};

/// Signature algorithms requested when the caller does not override them.
pub const DEFAULT_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512", "ES256", "ES384", "ES512"];

const DEFAULT_EXPIRATION_DAYS: u32 = 365;

/// Ordered set of JWK-like public-key records, exactly as the tool emitted
/// them.
pub type KeySet = Vec<serde_json::Value>;

/// Where the tool lives and how long it may run.
#[derive(Debug, Clone)]
pub struct KeygenToolConfig {
    pub java_bin: PathBuf,
    pub jar_path: PathBuf,
    pub timeout: Duration,
}

impl Default for KeygenToolConfig {
    fn default() -> Self {
        Self {
            java_bin: "java".into(),
            jar_path: "/opt/key-rotation/javalibs/keygen.jar".into(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// One generation request. Built fresh each cycle, never persisted.
#[derive(Debug)]
pub struct KeygenRequest {
    pub keystore_password: SecretString,
    pub keystore_path: PathBuf,
    pub dn_name: String,
    pub expiration_days: u32,
    pub algorithms: Vec<String>,
}

impl KeygenRequest {
    /// Request with the default expiration and algorithm list.
    pub fn new(
        keystore_password: SecretString,
        keystore_path: impl Into<PathBuf>,
        dn_name: impl Into<String>,
    ) -> Self {
        Self {
            keystore_password,
            keystore_path: keystore_path.into(),
            dn_name: dn_name.into(),
            expiration_days: DEFAULT_EXPIRATION_DAYS,
            algorithms: DEFAULT_ALGORITHMS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Expected shape of the tool's stdout.
#[derive(Debug, Deserialize)]
struct ToolOutput {
    pub_keys: KeySet,
}

/// Handle on the external key-generation tool.
#[derive(Debug, Clone)]
pub struct KeygenTool {
    config: KeygenToolConfig,
}

impl KeygenTool {
    pub fn new(config: KeygenToolConfig) -> Self {
        Self { config }
    }

    /// Run the tool and parse the public-key set off its stdout.
    ///
    /// The keystore file at `req.keystore_path` is (re)written by the tool as
    /// a side effect. On any error the previous keystore state is whatever
    /// the tool left behind; the caller discards the whole attempt and
    /// regenerates next cycle.
    pub async fn generate(&self, req: &KeygenRequest) -> GenerationResult<KeySet> {
        let mut command = Command::new(&self.config.java_bin);
        command
            .arg("-jar")
            .arg(&self.config.jar_path)
            .arg("-algorithms")
            .args(&req.algorithms)
            .arg("-dnname")
            .arg(&req.dn_name)
            .arg("-expiration")
            .arg(req.expiration_days.to_string())
            .arg("-keystore")
            .arg(&req.keystore_path)
            .arg("-keypasswd")
            .arg(req.keystore_password.expose_secret())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the timed-out future must reap the child.
            .kill_on_drop(true);

        tracing::debug!(
            tool = %self.config.jar_path.display(),
            keystore = %req.keystore_path.display(),
            algorithms = ?req.algorithms,
            "invoking key-generation tool"
        );

        let child = command.spawn()?;
        let output = timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| GenerationError::TimedOut {
                timeout_secs: self.config.timeout.as_secs(),
            })??;

        if !output.status.success() {
            return Err(GenerationError::ProcessFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let payload: ToolOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            GenerationError::MalformedOutput {
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(keys = payload.pub_keys.len(), "key-generation tool succeeded");
        Ok(payload.pub_keys)
    }
}
