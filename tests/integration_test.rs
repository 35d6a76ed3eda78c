use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use predicates::prelude::*;
use std::net::TcpListener;
use tempfile::tempdir;

/// The binary under test, with proxy settings cleared so requests reach the mock server.
fn cloudconn() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("cloudconn"));
    for var in [
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
        "CLOUDCONN_CONFIG",
        "CLOUDCONN_TIMEOUT",
        "CLOUDCONN_RETRY_DELAY",
        "CLOUDCONN_MAX_RETRIES",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// An address nothing listens on.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[test]
fn test_request_prints_response() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v1/nodes")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": "node-1"}]"#)
        .create();

    cloudconn()
        .args(["request", &server.url(), "/v1/nodes", "-i"])
        .assert()
        .success()
        .stdout(predicate::str::contains("200 OK"))
        .stdout(predicate::str::contains("content-type: application/json"))
        .stdout(predicate::str::contains(r#"[{"id": "node-1"}]"#));

    mock.assert();
}

#[test]
fn test_request_sends_method_headers_and_body() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/servers")
        .match_header("x-auth-token", "secret")
        .match_body(r#"{"name":"web"}"#)
        .with_status(201)
        .create();

    cloudconn()
        .args([
            "request",
            &server.url(),
            "/v1/servers",
            "-X",
            "POST",
            "-H",
            "X-Auth-Token: secret",
            "-d",
            r#"{"name":"web"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("201 Created"));

    mock.assert();
}

#[test]
fn test_request_non_429_errors_are_plain_responses() {
    let mut server = Server::new();
    let mock = server.mock("GET", "/").with_status(409).create();

    cloudconn()
        .args(["request", &server.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("409 Conflict"));

    mock.assert();
}

#[test]
fn test_request_rate_limited() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/")
        .with_status(429)
        .with_header("retry-after", "3")
        .with_header("content-type", "application/json")
        .expect(1)
        .create();

    cloudconn()
        .args(["request", &server.url(), "--max-retries", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rate limit exceeded"))
        .stderr(predicate::str::contains("Retry after 3.0s"));

    // Rate limits are left to the caller, never retried.
    mock.assert();
}

#[test]
fn test_request_connection_refused_retries_then_fails() {
    cloudconn()
        .args([
            "request",
            &closed_port_url(),
            "--retry-delay",
            "0.01",
            "--max-retries",
            "2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Connection refused"));
}

#[test]
fn test_request_uses_config_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("connection.json");
    std::fs::write(
        &config_path,
        r#"{"timeout_secs": 5, "retry_delay_secs": 0.01, "max_retries": 1}"#,
    )
    .unwrap();

    let mut server = Server::new();
    let mock = server.mock("GET", "/").with_status(204).create();

    cloudconn()
        .args(["--config", config_path.to_str().unwrap(), "request", &server.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("204 No Content"));

    mock.assert();
}

#[test]
fn test_request_invalid_config_file_fails() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("connection.json");
    std::fs::write(&config_path, r#"{"backoff": 0.5}"#).unwrap();

    cloudconn()
        .env("CLOUDCONN_CONFIG", &config_path)
        .args(["request", "http://localhost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}
