//! Integration tests for the `rove` binary.
//!
//! The binary runs against a local stub chat-completions endpoint.

use rove_agent::testing::{StubResponse, StubServer};
use serde_json::{json, Value};
use tokio::process::Command;

async fn chat_stub() -> StubServer {
    StubServer::scripted(vec![StubResponse::json(
        200,
        json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]}),
    )])
    .await
    .unwrap()
}

fn rove(endpoint: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rove"));
    cmd.env("LLM_ENDPOINT", endpoint)
        .env("LLM_API_KEY", "test-key")
        .env("MAX_RETRY_ATTEMPTS", "1")
        .env("RUST_LOG", "info")
        .env_remove("LLM_API_VERSION");
    cmd
}

#[tokio::test]
async fn test_json_report_is_alone_on_stdout() {
    let server = chat_stub().await;
    let repo = tempfile::tempdir().unwrap();

    let output = rove(&server.url(""))
        .args(["run", "--json"])
        .arg(repo.path())
        .args(["say", "hi"])
        .output()
        .await
        .unwrap();

    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"]["status"], "idle_exit");
    assert_eq!(report["outcome"]["reply"], "hello");
    assert_eq!(report["turns"], 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Repository:"));
    assert!(server.hits() >= 2);
}

#[tokio::test]
async fn test_missing_repository_exits_with_usage() {
    let server = chat_stub().await;
    let dir = tempfile::tempdir().unwrap();

    let output = rove(&server.url(""))
        .arg("run")
        .arg(dir.path().join("missing"))
        .arg("anything")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: rove run"));
    assert!(output.stdout.is_empty());
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn test_too_few_arguments_exits_with_usage() {
    let output = Command::new(env!("CARGO_BIN_EXE_rove"))
        .args(["run", "."])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: rove run"));
}
