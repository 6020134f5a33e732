use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use mediathek_core::testing::fixtures;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Write a config rooted in `dir` and return its path.
fn write_config(dir: &Path, port: u16, source_url: &str, updater_enabled: bool) -> PathBuf {
    let rules = dir.join("categories.json");
    std::fs::write(&rules, fixtures::CATEGORY_RULES).unwrap();

    let config = format!(
        r#"
[server]
host = "127.0.0.1"
port = {port}

[source]
url = "{source_url}"
timeout_secs = 5

[storage]
data_dir = "{data_dir}"

[updater]
enabled = {updater_enabled}

[import]
categories_file = "{rules}"
"#,
        data_dir = dir.join("data").display(),
        rules = rules.display(),
    );

    let path = dir.join("config.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn command(config_path: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(env!("CARGO_BIN_EXE_mediathekd"));
    cmd.env("MEDIATHEK_CONFIG", config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true);
    cmd
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn run_once(config_path: &Path) -> std::process::Output {
    timeout(Duration::from_secs(30), command(config_path).arg("--once").output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command")
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(dir.path(), port, "http://127.0.0.1:9/filme.db.bz2", false);

    let mut server = command(&config).spawn().expect("Failed to spawn server");
    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["catalog"]["total"], 0);
    assert_eq!(json["updater"]["running"], false);

    let body = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .unwrap();
    assert!(body.contains("mediathek_catalog_items"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_once_imports_snapshot() {
    let dir = TempDir::new().unwrap();
    let upstream = MockServer::start().await;

    let plain = fixtures::write_snapshot(
        dir.path(),
        &fixtures::film_table(4, chrono::Utc::now().timestamp() - 3_600),
    );
    let body = fixtures::bzip2_bytes(&std::fs::read(plain).unwrap());
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&upstream)
        .await;

    let url = format!("{}/filmliste-v2.db.bz2", upstream.uri());
    let config = write_config(dir.path(), get_available_port(), &url, true);

    let output = run_once(&config).await;
    assert!(output.status.success());

    let data = dir.path().join("data");
    assert!(data.join("source").join("filmliste-v2.db").exists());
    assert!(data.join("app").join("app.db").exists());

    let state: serde_json::Value =
        serde_json::from_slice(&std::fs::read(data.join("meta").join("state.json")).unwrap())
            .unwrap();
    assert_eq!(state["rowCount"], 4);
}

#[tokio::test]
async fn test_once_exits_nonzero_when_upstream_fails() {
    let dir = TempDir::new().unwrap();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let url = format!("{}/filmliste-v2.db.bz2", upstream.uri());
    let config = write_config(dir.path(), get_available_port(), &url, true);

    let output = run_once(&config).await;
    assert!(!output.status.success());
    assert!(!dir.path().join("data/source/filmliste-v2.db").exists());
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let output = timeout(
        Duration::from_secs(5),
        command(Path::new("/nonexistent/config.toml")).output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!output.status.success());
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), 0, "http://127.0.0.1:9/filme.db.bz2", false);

    let output = timeout(Duration::from_secs(5), command(&config).output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert!(!output.status.success());
}

#[tokio::test]
async fn test_missing_category_rules_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), get_available_port(), "http://127.0.0.1:9/x.db.bz2", false);
    std::fs::remove_file(dir.path().join("categories.json")).unwrap();

    let output = timeout(Duration::from_secs(5), command(&config).output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert!(!output.status.success());
}
