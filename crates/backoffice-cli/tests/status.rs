//! Integration tests for session resolution and refresh.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn backoffice(home: &Path, api_url: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("backoffice");
    cmd.env("BACKOFFICE_HOME", home)
        .env("BACKOFFICE_API_URL", api_url)
        .env("BACKOFFICE_CLIENT_API_KEY", "client-api")
        .env("BACKOFFICE_CLIENT_KEY", "client-key")
        .env_remove("BACKOFFICE_VENUE")
        .env_remove("BACKOFFICE_IDENTITY_URL");
    cmd
}

fn write_session(home: &Path, access: &str, refresh: &str, expires_at: u64) {
    fs::write(
        home.join("session.json"),
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_at": expires_at,
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        home.join("tokens.json"),
        json!({ "adminToken": access, "refreshToken": refresh }).to_string(),
    )
    .unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn far_future() -> u64 {
    4_102_444_800 // 2100-01-01
}

#[tokio::test]
async fn test_status_without_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    backoffice(home.path(), &mock_server.uri())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[tokio::test]
async fn test_status_valid_session_does_not_refresh() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    write_session(home.path(), "A1", "R1", far_future());

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    backoffice(home.path(), &mock_server.uri())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Authenticated"));

    let tokens = read_json(&home.path().join("tokens.json"));
    assert_eq!(tokens["adminToken"], "A1");
}

#[tokio::test]
async fn test_status_refreshes_expired_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    write_session(home.path(), "A1", "R1", 1_000);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer R1"))
        .and(header("x-api-key", "client-api"))
        .and(header("x-client-key", "client-key"))
        .and(body_json(json!({ "venue_identifier": "main" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "refresh_token": "R2",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    backoffice(home.path(), &mock_server.uri())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Authenticated"));

    let tokens = read_json(&home.path().join("tokens.json"));
    assert_eq!(tokens["adminToken"], "A2");
    assert_eq!(tokens["refreshToken"], "R2");

    let session = read_json(&home.path().join("session.json"));
    assert_eq!(session["access_token"], "A2");
    assert!(session["expires_at"].as_u64().unwrap() > 1_000);
}

#[tokio::test]
async fn test_status_sends_configured_venue() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    write_session(home.path(), "A1", "R1", 1_000);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({ "venue_identifier": "harbour" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "refresh_token": "R2",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    backoffice(home.path(), &mock_server.uri())
        .env("BACKOFFICE_VENUE", "harbour")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Authenticated"));
}

#[tokio::test]
async fn test_status_signs_out_when_refresh_rejected() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    write_session(home.path(), "A1", "R1", 1_000);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "refresh token revoked" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    backoffice(home.path(), &mock_server.uri())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));

    assert!(!home.path().join("session.json").exists());
    let tokens = read_json(&home.path().join("tokens.json"));
    assert_eq!(tokens["adminToken"], "A1");
    assert_eq!(tokens["refreshToken"], "R1");
}
