use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET_VARS: [&str; 4] = [
    "LLAMACLOUD_API_KEY",
    "OPENROUTER_API_KEY",
    "PIPELINE_ID",
    "APP_PASSWORD",
];

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_aa-chat"))
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join("aa-chat.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

/// Run the binary with a clean environment plus `vars`.
fn run(config_path: &Path, args: &[&str], vars: &[(&str, &str)]) -> (String, String, bool) {
    let mut cmd = Command::new(binary());
    for var in SECRET_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    for (k, v) in vars {
        cmd.env(k, v);
    }
    let output = cmd
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run aa-chat binary: {}", e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_missing_secrets_fail_before_start() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "");

    let (stdout, stderr, success) = run(&config_path, &["ask", "What is step 4?"], &[]);
    assert!(!success);
    assert!(stdout.is_empty(), "unexpected stdout: {}", stdout);
    assert!(stderr.contains("LLAMACLOUD_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_missing_pipeline_id_named_in_error() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "");

    let (_, stderr, success) = run(
        &config_path,
        &["serve"],
        &[("LLAMACLOUD_API_KEY", "llx"), ("OPENROUTER_API_KEY", "sk-or")],
    );
    assert!(!success);
    assert!(stderr.contains("PIPELINE_ID"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "[chat]\nvariant = \"chatty\"\n");

    let (_, stderr, success) = run(&config_path, &["ask", "q"], &[]);
    assert!(!success);
    assert!(stderr.contains("Failed to parse config file"), "stderr: {}", stderr);
}

#[test]
fn test_explicit_missing_config_is_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run(&missing, &["ask", "q"], &[]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/pipelines/pipe-1/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retrieval_nodes": [
                { "node": { "text": "Step Four: Made a searching and fearless moral inventory..." } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Step 4 is a moral inventory [Source 1]." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config_path = write_config(
        tmp.path(),
        &format!(
            "[retrieval]\nbase_url = \"{uri}\"\n\n[completion]\nbase_url = \"{uri}\"\n",
            uri = server.uri()
        ),
    );

    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run(
            &config_path,
            &["ask", "What is step 4?"],
            &[
                ("LLAMACLOUD_API_KEY", "llx"),
                ("OPENROUTER_API_KEY", "sk-or"),
                ("PIPELINE_ID", "pipe-1"),
            ],
        )
    })
    .await
    .unwrap();

    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Step 4 is a moral inventory [Source 1]."));
    assert!(stdout.contains("**Source 1:**"));
}
