use std::path::Path;
use std::time::Duration;

use clap::Parser;
use interactive_feedback::config::CONSOLE_WORKER_NAME;
use interactive_feedback::worker::args::WorkerArgs;
use interactive_feedback::{config::GlobalConfig, AppError};

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("empty config is valid");
    assert_eq!(config, GlobalConfig::default());
    assert_eq!(config.liveness_interval(), Duration::from_millis(100));
    assert_eq!(config.feedback.prefix, "User feedback");
    assert!(config.worker.program.is_none());
}

#[test]
fn full_config_parses_every_section() {
    let raw = r#"
[worker]
program = "/opt/feedback/gui-worker"
args = ["--fullscreen"]

[runner]
liveness_interval_ms = 250

[feedback]
prefix = "Reviewer says"
default_summary = "Done, please check."
"#;
    let config = GlobalConfig::from_toml_str(raw).expect("valid config");
    assert_eq!(
        config.worker_program().to_str(),
        Some("/opt/feedback/gui-worker")
    );
    assert_eq!(config.worker.args, vec!["--fullscreen"]);
    assert_eq!(config.liveness_interval(), Duration::from_millis(250));
    assert_eq!(config.feedback.prefix, "Reviewer says");
    assert_eq!(config.feedback.default_summary, "Done, please check.");
}

#[test]
fn zero_liveness_interval_is_rejected() {
    let err = GlobalConfig::from_toml_str("[runner]\nliveness_interval_ms = 0\n")
        .expect_err("zero interval must fail");
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("liveness_interval_ms"));
}

#[test]
fn empty_worker_program_is_rejected() {
    let err = GlobalConfig::from_toml_str("[worker]\nprogram = \"\"\n")
        .expect_err("empty program must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn invalid_toml_is_config_error() {
    let err = GlobalConfig::from_toml_str("[runner\n").expect_err("broken toml");
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn default_worker_is_console_binary_next_to_executable() {
    let program = GlobalConfig::default().worker_program();
    let name = program
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert!(name.starts_with(CONSOLE_WORKER_NAME));
}

#[test]
fn load_from_missing_path_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_path(dir.path().join("absent.toml"))
        .expect_err("missing file");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[feedback]\nprefix = \"Note\"\n").expect("write config");
    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.feedback.prefix, "Note");
}

#[test]
fn config_file_is_shared_with_the_console_worker() {
    let mut config = GlobalConfig::default();
    config.share_with_console_worker(Path::new("/etc/feedback/config.toml"));
    assert_eq!(config.worker.args, vec!["--config=/etc/feedback/config.toml"]);
}

#[test]
fn custom_worker_arguments_are_left_alone() {
    let mut config = GlobalConfig::from_toml_str(
        "[worker]\nprogram = \"/opt/gui-worker\"\nargs = [\"--fullscreen\"]\n",
    )
    .expect("valid config");
    config.share_with_console_worker(Path::new("/etc/feedback/config.toml"));
    assert_eq!(config.worker.args, vec!["--fullscreen"]);
}

#[test]
fn console_worker_reads_the_shared_runner_tuning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[runner]\nliveness_interval_ms = 40\n").expect("write config");

    let mut server = GlobalConfig::load_from_path(&path).expect("load");
    server.share_with_console_worker(&path);

    let argv = std::iter::once("interactive-feedback-console".to_owned())
        .chain(server.worker.args.iter().cloned());
    let worker = WorkerArgs::try_parse_from(argv).expect("worker args parse");
    let shared = GlobalConfig::load_from_path(worker.config.expect("config forwarded"))
        .expect("load shared");
    assert_eq!(shared.liveness_interval(), Duration::from_millis(40));
}
