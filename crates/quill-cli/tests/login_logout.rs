//! Integration tests for the session commands.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn grant_body(access: &str, refresh: &str, csrf: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 900,
        "csrf_token": csrf,
    })
}

fn profile_body() -> serde_json::Value {
    serde_json::json!({
        "id": 7,
        "email": "reader@example.com",
        "full_name": "Avid Reader",
        "is_active": true,
        "created_at": "2026-02-01T08:30:00",
    })
}

/// Test: login stores the token triple in tokens.json.
#[tokio::test]
async fn test_login_stores_tokens() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(serde_json::json!({
            "email": "reader@example.com",
            "password": "hunter2hunter2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("a1", "r1", "c1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .args([
            "login",
            "--email",
            "reader@example.com",
            "--password",
            "hunter2hunter2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as Avid Reader"));

    let tokens_path = temp.path().join("tokens.json");
    assert!(tokens_path.exists(), "tokens.json should exist");

    let contents = fs::read_to_string(&tokens_path).unwrap();
    assert!(contents.contains("a1"));
    assert!(contents.contains("r1"));
    assert!(contents.contains("c1"));
}

/// Test: login prompts for credentials on stdin when flags are omitted.
#[tokio::test]
async fn test_login_prompts_on_stdin() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(serde_json::json!({
            "email": "reader@example.com",
            "password": "hunter2hunter2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("a1", "r1", "c1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .arg("login")
        .write_stdin("reader@example.com\nhunter2hunter2\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as"));
}

/// Test: login rejects empty input at the prompt.
#[test]
fn test_login_rejects_empty_input() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .arg("login")
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty"));
}

/// Test: rejected login reports the server detail and stores nothing.
#[tokio::test]
async fn test_login_failure_reports_detail() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "detail": "Invalid email or password" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .args(["login", "--email", "reader@example.com", "--password", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid email or password"));

    let tokens_path = temp.path().join("tokens.json");
    if tokens_path.exists() {
        let contents = fs::read_to_string(&tokens_path).unwrap();
        assert!(!contents.contains("access_token"));
    }
}

/// Test: register sends the full name and signs in.
#[tokio::test]
async fn test_register_signs_in() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(serde_json::json!({
            "email": "new@example.com",
            "password": "hunter2hunter2",
            "full_name": "New Writer",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(grant_body("a1", "r1", "c1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .args([
            "register",
            "--email",
            "new@example.com",
            "--password",
            "hunter2hunter2",
            "--full-name",
            "New Writer",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as"));
}

/// Test: logout clears the token file.
#[test]
fn test_logout_clears_tokens() {
    let temp = tempdir().unwrap();
    let tokens_path = temp.path().join("tokens.json");

    fs::write(
        &tokens_path,
        r#"{"access_token": "a1", "refresh_token": "r1", "csrf_token": "c1"}"#,
    )
    .unwrap();

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out"));

    let contents = fs::read_to_string(&tokens_path).unwrap();
    assert!(!contents.contains("a1"), "tokens should be cleared");
}

/// Test: logout without a session says so.
#[test]
fn test_logout_without_session() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active session"));
}

/// Test: whoami resolves the stored session.
#[tokio::test]
async fn test_whoami_shows_profile() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    fs::write(
        temp.path().join("tokens.json"),
        r#"{"access_token": "a1", "refresh_token": "r1", "csrf_token": "c1"}"#,
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("reader@example.com"));
}

/// Test: whoami without tokens reports signed out, no network call.
#[tokio::test]
async fn test_whoami_not_logged_in() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .expect(0)
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

/// Test: tokens.json has restricted permissions on Unix.
#[cfg(unix)]
#[tokio::test]
async fn test_token_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("a1", "r1", "c1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(&server)
        .await;

    cargo_bin_cmd!("quill")
        .env("QUILL_HOME", temp.path())
        .env("QUILL_API_URL", server.uri())
        .args([
            "login",
            "--email",
            "reader@example.com",
            "--password",
            "hunter2hunter2",
        ])
        .assert()
        .success();

    let metadata = fs::metadata(temp.path().join("tokens.json")).unwrap();
    let mode = metadata.permissions().mode();
    assert_eq!(mode & 0o777, 0o600, "tokens.json should have 0600 permissions");
}
