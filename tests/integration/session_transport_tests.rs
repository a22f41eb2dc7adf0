//! Integration tests for the worker session round trip.
//!
//! Workers are small `sh` scripts. The first script argument is a marker
//! file the script can use to report back (its pid or the slot path); the
//! session arguments follow.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serial_test::serial;

use interactive_feedback::config::GlobalConfig;
use interactive_feedback::models::session::{SessionRequest, SessionState, Theme};
use interactive_feedback::orchestrator::reaper::{descendants_of, is_alive};
use interactive_feedback::orchestrator::session_transport::{SessionTransport, WorkerCommand};
use interactive_feedback::AppError;

/// Shell prelude: `$marker` and `$out` are set from the arguments.
const PRELUDE: &str = r#"marker="$1"; shift
while [ $# -gt 0 ]; do
  case "$1" in --output-file=*) out="${1#--output-file=}" ;; esac
  shift
done
"#;

fn script_worker(body: &str, marker: &Path) -> SessionTransport {
    let script = format!("{PRELUDE}{body}");
    SessionTransport::new(WorkerCommand::new("sh").with_args([
        "-c".to_owned(),
        script,
        "worker".to_owned(),
        marker.to_string_lossy().into_owned(),
    ]))
}

fn request(project: &Path) -> SessionRequest {
    SessionRequest::new(project.to_path_buf(), "Implemented the feature.".into(), Theme::Dark)
}

fn read_marker(marker: &Path) -> String {
    std::fs::read_to_string(marker)
        .expect("marker written")
        .trim()
        .to_owned()
}

// ── Cancel ───────────────────────────────────────────────────

#[tokio::test]
async fn worker_without_result_is_a_cancellation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let mut transport = script_worker("echo 'partial log'; exit 0", &marker);

    let result = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("cancel is not an error");

    assert!(result.feedback.is_empty());
    assert_eq!(result.command_logs, "partial log\n");
    assert_eq!(transport.state(), SessionState::Cancelled);
}

#[tokio::test]
async fn failing_worker_without_result_is_still_a_cancellation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let mut transport = script_worker("echo oops 1>&2; exit 7", &marker);

    let result = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("cancel is not an error");

    assert!(result.feedback.is_empty());
    assert_eq!(transport.state(), SessionState::Cancelled);
}

// ── Submit ───────────────────────────────────────────────────

#[tokio::test]
async fn submitted_result_is_parsed_and_slot_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let body = r#"echo "$out" > "$marker"
printf '%s' '{"command_logs":"$ make\nok\n","interactive_feedback":"{\"text_feedback\":\"great work\",\"images\":[\"/tmp/a.png\"]}"}' > "$out"
"#;
    let mut transport = script_worker(body, &marker);

    let result = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("session");

    assert_eq!(transport.state(), SessionState::Completed);
    assert_eq!(result.command_logs, "$ make\nok\n");
    assert_eq!(result.feedback.text_feedback, "great work");
    assert_eq!(result.feedback.images, vec![PathBuf::from("/tmp/a.png")]);

    let slot = PathBuf::from(read_marker(&marker));
    assert!(!slot.exists(), "result slot must be deleted after retrieval");
}

#[tokio::test]
async fn worker_receives_serialized_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let mut transport = SessionTransport::new(WorkerCommand::new("sh").with_args([
        "-c".to_owned(),
        r#"marker="$1"; shift; printf '%s\n' "$@" > "$marker""#.to_owned(),
        "worker".to_owned(),
        marker.to_string_lossy().into_owned(),
    ]));

    transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("session");

    let seen = std::fs::read_to_string(&marker).expect("args recorded");
    let lines: Vec<&str> = seen.lines().collect();
    assert_eq!(
        lines[0],
        format!("--project-directory={}", dir.path().display())
    );
    assert_eq!(lines[1..3], ["--prompt=Implemented the feature.", "--theme=dark"]);
    assert!(lines[3].starts_with("--output-file="));
    assert!(lines[3].ends_with("result.json"));
    assert_eq!(lines.len(), 4);
}

#[tokio::test]
async fn empty_nested_feedback_is_an_empty_payload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let body = r#"printf '%s' '{"command_logs":"","interactive_feedback":""}' > "$out""#;
    let mut transport = script_worker(body, &marker);

    let result = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("session");
    assert!(result.feedback.is_empty());
    assert_eq!(transport.state(), SessionState::Completed);
}

#[tokio::test]
async fn scratch_images_live_as_long_as_the_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let body = r#"img="$(dirname "$out")/capture.png"
printf 'png' > "$img"
printf '{"command_logs":"","interactive_feedback":"{\\"text_feedback\\":\\"\\",\\"images\\":[\\"%s\\"]}"}' "$img" > "$out"
"#;
    let mut transport = script_worker(body, &marker);

    let result = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("session");

    let image = result.feedback.images.first().cloned().expect("one image");
    assert_eq!(std::fs::read(&image).expect("image readable"), b"png");

    drop(result);
    assert!(!image.exists(), "captured image is removed with the session");
}

// ── Failures ─────────────────────────────────────────────────

#[tokio::test]
async fn invalid_result_is_a_parse_error_and_slot_is_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let body = r#"echo "$out" > "$marker"; printf 'not json' > "$out""#;
    let mut transport = script_worker(body, &marker);

    let err = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect_err("parse error");

    assert!(matches!(err, AppError::ResultParse(_)));
    assert!(!PathBuf::from(read_marker(&marker)).exists());
}

#[tokio::test]
async fn missing_worker_is_a_launch_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut transport = SessionTransport::new(WorkerCommand::new(
        dir.path().join("no-such-worker"),
    ));

    let err = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect_err("launch error");

    assert!(matches!(err, AppError::SessionLaunch(_)));
    assert_eq!(transport.state(), SessionState::LaunchFailed);
}

#[tokio::test]
#[serial]
async fn slow_worker_times_out_without_orphans() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let body = r#"echo $$ > "$marker"
sleep 30 &
sleep 30
"#;
    let mut transport = script_worker(body, &marker);
    let req = request(dir.path());

    let scan_tree = async {
        let mut tree = Vec::new();
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let Ok(raw) = std::fs::read_to_string(&marker) else {
                continue;
            };
            let Ok(pid) = raw.trim().parse::<u32>() else {
                continue;
            };
            let descendants = descendants_of(pid);
            if descendants.len() >= 2 {
                tree = descendants;
                tree.push(pid);
                break;
            }
        }
        tree
    };

    let (outcome, tree) = tokio::join!(
        transport.run_session(&req, Duration::from_millis(1500)),
        scan_tree
    );

    let err = outcome.expect_err("must time out");
    assert!(matches!(err, AppError::SessionTimeout(_)));
    assert_eq!(transport.state(), SessionState::TimedOut);
    assert!(tree.len() >= 3, "the worker tree should have been observed");

    let mut gone = false;
    for _ in 0..50 {
        if tree.iter().all(|pid| !is_alive(*pid)) {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(gone, "no worker process may outlive the timeout");
}

#[tokio::test]
async fn next_session_starts_from_idle_after_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    // First run writes garbage, later runs cancel.
    let body = r#"if [ -f "$marker" ]; then exit 0; fi
touch "$marker"
printf 'bad' > "$out"
"#;
    let mut transport = script_worker(body, &marker);

    let err = transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect_err("first session fails");
    assert!(matches!(err, AppError::ResultParse(_)));
    assert_eq!(transport.state(), SessionState::Completed);

    transport
        .run_session(&request(dir.path()), Duration::from_secs(10))
        .await
        .expect("second session");
    assert_eq!(transport.state(), SessionState::Cancelled);
}

#[test]
fn transport_from_config_starts_idle() {
    let config = GlobalConfig::from_toml_str("[worker]\nprogram = \"/bin/true\"\n").expect("config");
    let transport = SessionTransport::from_config(&config);
    assert_eq!(transport.state(), SessionState::Idle);
}
