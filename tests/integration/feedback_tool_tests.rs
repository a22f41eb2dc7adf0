//! Integration tests for the `interactive_feedback` tool glue: argument
//! defaults, packaging of the worker result, and error mapping.
//!
//! Workers are `sh` scripts; the first script argument is a file the
//! script records its session arguments in.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rmcp::model::{CallToolResult, ErrorCode};
use serde_json::{json, Value};

use interactive_feedback::config::GlobalConfig;
use interactive_feedback::mcp::handler::AppState;
use interactive_feedback::mcp::tools::interactive_feedback::run;
use interactive_feedback::orchestrator::session_transport::{SessionTransport, WorkerCommand};

/// Shell prelude: records the session arguments in `$1` and sets `$out`.
const PRELUDE: &str = r#"record="$1"; shift
printf '%s\n' "$@" > "$record"
for arg in "$@"; do
  case "$arg" in --output-file=*) out="${arg#--output-file=}" ;; esac
done
"#;

fn state_for(body: &str, record: &Path) -> AppState {
    let transport = SessionTransport::new(WorkerCommand::new("sh").with_args([
        "-c".to_owned(),
        format!("{PRELUDE}{body}"),
        "worker".to_owned(),
        record.to_string_lossy().into_owned(),
    ]));
    AppState::with_transport(Arc::new(GlobalConfig::default()), transport)
        .with_session_timeout(Duration::from_secs(10))
}

fn arguments(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn content_of(result: &CallToolResult) -> Vec<Value> {
    let value = serde_json::to_value(result).expect("serialize result");
    value["content"].as_array().cloned().expect("content array")
}

#[tokio::test]
async fn missing_arguments_use_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args");
    let state = state_for("exit 0", &record);

    run(&state, None).await.expect("cancel is not an error");

    let seen = std::fs::read_to_string(&record).expect("args recorded");
    let defaults = GlobalConfig::default();
    assert!(seen
        .lines()
        .any(|line| line == format!("--prompt={}", defaults.feedback.default_summary)));
    assert!(seen.lines().any(|line| line == "--theme=light"));
}

#[tokio::test]
async fn submitted_text_and_image_become_content_blocks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args");
    let body = r#"img="$(dirname "$out")/capture.png"
printf 'png' > "$img"
printf '{"command_logs":"","interactive_feedback":"{\\"text_feedback\\":\\"looks good\\",\\"images\\":[\\"%s\\"]}"}' "$img" > "$out"
"#;
    let state = state_for(body, &record);

    let result = run(
        &state,
        arguments(json!({
            "project_directory": dir.path().to_string_lossy(),
            "summary": "- fixed the parser\n- added tests",
            "theme": "dark",
        })),
    )
    .await
    .expect("session");

    let content = content_of(&result);
    assert_eq!(content.len(), 2);
    assert_eq!(content[0]["type"], "text");
    assert!(content[0]["text"]
        .as_str()
        .expect("text")
        .starts_with("User feedback: looks good\nSubmitted at: "));
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[1]["mimeType"], "image/png");
    assert_eq!(content[1]["data"], "cG5n");

    let seen = std::fs::read_to_string(&record).expect("args recorded");
    assert!(seen.contains("--prompt=- fixed the parser\n- added tests\n"));
    let slot = seen
        .lines()
        .find_map(|line| line.strip_prefix("--output-file="))
        .map(PathBuf::from)
        .expect("slot argument");
    let scratch = slot.parent().expect("scratch dir").to_path_buf();
    assert!(!scratch.exists(), "scratch is removed once content is built");
}

#[tokio::test]
async fn cancelled_session_reports_no_feedback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args");
    let state = state_for("echo 'partial log'; exit 1", &record);

    let result = run(&state, None).await.expect("cancel is not an error");

    let content = content_of(&result);
    assert_eq!(content.len(), 1);
    assert!(content[0]["text"]
        .as_str()
        .expect("text")
        .starts_with("No feedback was provided."));
}

#[tokio::test]
async fn unreadable_result_is_an_internal_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args");
    let state = state_for(r#"printf 'not json' > "$out""#, &record);

    let err = run(&state, None).await.expect_err("parse failure");
    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert!(err.message.starts_with("result parse:"));
}

#[tokio::test]
async fn timed_out_session_is_an_internal_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args");
    let state = state_for("sleep 30", &record).with_session_timeout(Duration::from_millis(500));

    let err = run(&state, None).await.expect_err("timeout");
    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert!(err.message.starts_with("session timeout:"));
}

#[tokio::test]
async fn missing_worker_is_an_internal_error() {
    let transport = SessionTransport::new(WorkerCommand::new("/nonexistent/feedback-worker"));
    let state = AppState::with_transport(Arc::new(GlobalConfig::default()), transport);

    let err = run(&state, None).await.expect_err("launch failure");
    assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    assert!(err.message.starts_with("session launch:"));
}

#[tokio::test]
async fn mistyped_arguments_are_invalid_params() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("args");
    let state = state_for("exit 0", &record);

    let err = run(&state, arguments(json!({ "summary": 42 })))
        .await
        .expect_err("invalid params");
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    assert!(!record.exists(), "no worker is launched for bad arguments");
}
