//! End-to-end cycle scenarios: a real store client against a fake KV server,
//! a real tool runner against a shell stub, and a scripted directory.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use keyrot_directory::test_util::{
    ScriptedDirectory, ScriptedEndpoint, ScriptedEntry, WriteBehavior,
};
use keyrot_directory::{ConfigUpdater, DirectoryEndpoint, DirectoryError};
use keyrot_keygen::{KeygenTool, KeygenToolConfig};
use keyrot_rotation::{Coordinator, CycleOutcome, RotationError, RotationPolicy};
use keyrot_store::{KvStore, KvStoreConfig};

const SALT: &str = "abcdefghijklmnopqrstuvwx";
const BIND_PW: &str = "ldap-superuser-pw";
const JKS_PASS: &str = "jks-pass";
const INUM: &str = "@!1111.2222";
const INTERVAL_DAYS: u32 = 2;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn days(n: i64) -> i64 {
    n * 24 * 3600
}

fn ep(n: u16) -> DirectoryEndpoint {
    DirectoryEndpoint {
        host: format!("ldap-{n}"),
        port: 1389,
    }
}

fn kv_body(value: &str, modify_index: u64) -> serde_json::Value {
    serde_json::json!([{
        "Key": "ignored",
        "Value": BASE64.encode(value),
        "CreateIndex": 1,
        "ModifyIndex": modify_index,
    }])
}

async fn mount_secret(server: &MockServer, key: &str, value: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/kv/{key}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(value, 1)))
        .mount(server)
        .await;
}

/// The six provisioning-owned keys every due cycle reads.
async fn mount_provisioned_secrets(server: &MockServer, tmp: &TempDir) {
    let keystore = tmp.path().join("oxauth-keys.jks");
    let encoded_pw = keyrot_secrets::encrypt(BIND_PW.as_bytes(), SALT).unwrap();
    mount_secret(server, "oxauth_openid_jks_pass", JKS_PASS).await;
    mount_secret(server, "oxauth_openid_jks_fn", keystore.to_str().unwrap()).await;
    mount_secret(server, "default_openid_jks_dn_name", "CN=oxAuth CA Certificates").await;
    mount_secret(server, "encoded_ox_ldap_pw", &encoded_pw).await;
    mount_secret(server, "encoded_salt", SALT).await;
    mount_secret(server, "inumAppliance", INUM).await;
}

async fn mount_last_rotated(server: &MockServer, timestamp: i64, modify_index: u64) {
    Mock::given(method("GET"))
        .and(path("/v1/kv/key_rotated_at"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(kv_body(&timestamp.to_string(), modify_index)),
        )
        .mount(server)
        .await;
}

/// Executable shell stub standing in for the keygen tool. Appends to a
/// marker file so tests can count invocations.
fn write_keygen_stub(tmp: &TempDir, body: &str) -> (PathBuf, PathBuf) {
    let marker = tmp.path().join("keygen-runs");
    let stub = tmp.path().join("keygen-stub");
    std::fs::write(&stub, format!("#!/bin/sh\necho run >> {}\n{body}\n", marker.display())).unwrap();
    let mut perms = std::fs::metadata(&stub).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&stub, perms).unwrap();
    (stub, marker)
}

fn keygen_runs(marker: &PathBuf) -> usize {
    std::fs::read_to_string(marker).map_or(0, |s| s.lines().count())
}

fn store_for(server: &MockServer) -> KvStore {
    let uri = server.uri();
    let (host, port) = uri
        .strip_prefix("http://")
        .and_then(|rest| rest.split_once(':'))
        .expect("mock server uri");
    KvStore::new(&KvStoreConfig {
        host: host.to_owned(),
        port: port.parse().expect("mock server port"),
        timeout: Duration::from_secs(2),
    })
    .expect("store client")
}

fn coordinator(
    server: &MockServer,
    stub: PathBuf,
    directory: &ScriptedDirectory,
    endpoints: Vec<DirectoryEndpoint>,
) -> Coordinator<ScriptedDirectory> {
    let keygen = KeygenTool::new(KeygenToolConfig {
        java_bin: stub,
        jar_path: "keygen.jar".into(),
        timeout: Duration::from_secs(5),
    });
    Coordinator::new(
        store_for(server),
        keygen,
        ConfigUpdater::new(directory.clone(), endpoints),
        RotationPolicy::new(INTERVAL_DAYS),
    )
}

const HAPPY_STUB: &str = r#"echo '{"pub_keys":[{"kid":"rs256-new","kty":"RSA"}]}'"#;

#[tokio::test]
async fn overdue_rotation_commits_and_advances_bookkeeping() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;
    mount_last_rotated(&server, now().timestamp() - days(3), 42).await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .and(query_param("cas", "42"))
        .and(body_string(now().timestamp().to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(true))
        .expect(1)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new()
        .endpoint(ep(1), ScriptedEndpoint::serving(ScriptedEntry::at_revision(41)));
    let (stub, _marker) = write_keygen_stub(&tmp, HAPPY_STUB);

    let outcome = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Rotated { report, rotated_at } => {
            assert_eq!(report.endpoint, ep(1));
            assert_eq!(report.revision, 42);
            assert_eq!(rotated_at, now().timestamp());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The committed blob carries exactly the generated set.
    let (_, _, update) = directory.writes().remove(0);
    let web_keys: serde_json::Value = serde_json::from_str(&update.web_keys_json).unwrap();
    assert_eq!(
        web_keys["keys"],
        serde_json::json!([{"kid": "rs256-new", "kty": "RSA"}])
    );
}

#[tokio::test]
async fn recent_rotation_is_not_due_and_touches_nothing() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_last_rotated(&server, now().timestamp() - days(1), 7).await;

    let directory = ScriptedDirectory::new();
    let (stub, marker) = write_keygen_stub(&tmp, HAPPY_STUB);

    let outcome = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::NotDue);
    assert_eq!(keygen_runs(&marker), 0);
    assert!(directory.connect_attempts().is_empty());
}

#[tokio::test]
async fn never_rotated_is_due_and_creates_bookkeeping() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;
    // No key_rotated_at mounted: the store has never seen it.
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .and(query_param("cas", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true))
        .expect(1)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new()
        .endpoint(ep(1), ScriptedEndpoint::serving(ScriptedEntry::at_revision(1)));
    let (stub, _marker) = write_keygen_stub(&tmp, HAPPY_STUB);

    let outcome = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Rotated { .. }));
}

#[tokio::test]
async fn unreachable_directory_leaves_bookkeeping_alone_and_regenerates_next_tick() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;
    // Never rotated; bookkeeping must stay absent.
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true))
        .expect(0)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new()
        .endpoint(ep(1), ScriptedEndpoint::unreachable())
        .endpoint(ep(2), ScriptedEndpoint::unreachable());
    let (stub, marker) = write_keygen_stub(&tmp, HAPPY_STUB);
    let coordinator = coordinator(&server, stub, &directory, vec![ep(1), ep(2)]);

    let err = coordinator.run_cycle(now()).await.unwrap_err();
    assert!(matches!(
        err,
        RotationError::Directory(DirectoryError::AllEndpointsUnreachable { attempted: 2 })
    ));

    // Next tick: still due, keys generated again from scratch.
    let err = coordinator.run_cycle(now()).await.unwrap_err();
    assert!(matches!(err, RotationError::Directory(_)));
    assert_eq!(keygen_runs(&marker), 2);
    assert!(directory.writes().is_empty());
}

#[tokio::test]
async fn failed_generation_never_reaches_the_directory() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true))
        .expect(0)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new()
        .endpoint(ep(1), ScriptedEndpoint::serving(ScriptedEntry::at_revision(1)));
    let (stub, _marker) = write_keygen_stub(&tmp, "echo 'keystore locked' >&2\nexit 2");

    let err = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RotationError::Generation(keyrot_keygen::GenerationError::ProcessFailed { .. })
    ));
    assert!(directory.connect_attempts().is_empty());
}

#[tokio::test]
async fn bookkeeping_race_is_reported_not_fatal() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;
    mount_last_rotated(&server, now().timestamp() - days(3), 42).await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .and(query_param("cas", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(false))
        .expect(1)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new()
        .endpoint(ep(1), ScriptedEndpoint::serving(ScriptedEntry::at_revision(41)));
    let (stub, _marker) = write_keygen_stub(&tmp, HAPPY_STUB);

    let outcome = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::BookkeepingRaced { .. }));
}

#[tokio::test]
async fn revision_conflict_aborts_the_cycle_without_bookkeeping() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true))
        .expect(0)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new().endpoint(
        ep(1),
        ScriptedEndpoint::serving(ScriptedEntry::at_revision(5))
            .with_write(WriteBehavior::Conflict),
    );
    let (stub, _marker) = write_keygen_stub(&tmp, HAPPY_STUB);

    let err = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RotationError::Directory(DirectoryError::RevisionConflict { expected: 5 })
    ));
}

#[tokio::test]
async fn missing_required_secret_fails_the_tick() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    // Bookkeeping absent and no provisioned secrets at all.
    let directory = ScriptedDirectory::new();
    let (stub, _marker) = write_keygen_stub(&tmp, HAPPY_STUB);

    let err = coordinator(&server, stub, &directory, vec![ep(1)])
        .run_cycle(now())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RotationError::Store(keyrot_store::StoreError::KeyMissing { key })
            if key == "oxauth_openid_jks_pass"
    ));
}

#[tokio::test]
async fn shutdown_token_stops_the_loop_between_cycles() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    // Freshly rotated: every tick is a cheap NotDue.
    mount_last_rotated(&server, Utc::now().timestamp(), 7).await;

    let directory = ScriptedDirectory::new();
    let (stub, _marker) = write_keygen_stub(&tmp, HAPPY_STUB);
    let coordinator = coordinator(&server, stub, &directory, vec![ep(1)]);

    let shutdown = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { coordinator.run(Duration::from_millis(10), shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn successful_rotation_makes_the_next_tick_not_due() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_provisioned_secrets(&server, &tmp).await;

    // First read sees the stale timestamp, later reads see what the cycle
    // wrote.
    Mock::given(method("GET"))
        .and(path("/v1/kv/key_rotated_at"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(kv_body(&(now().timestamp() - days(3)).to_string(), 42)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_last_rotated(&server, now().timestamp(), 43).await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/key_rotated_at"))
        .and(query_param("cas", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true))
        .expect(1)
        .mount(&server)
        .await;

    let directory = ScriptedDirectory::new()
        .endpoint(ep(1), ScriptedEndpoint::serving(ScriptedEntry::at_revision(41)));
    let (stub, marker) = write_keygen_stub(&tmp, HAPPY_STUB);
    let coordinator = coordinator(&server, stub, &directory, vec![ep(1)]);

    let first = coordinator.run_cycle(now()).await.unwrap();
    assert!(matches!(first, CycleOutcome::Rotated { .. }));

    let second = coordinator
        .run_cycle(now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(second, CycleOutcome::NotDue);
    assert_eq!(keygen_runs(&marker), 1);
}
