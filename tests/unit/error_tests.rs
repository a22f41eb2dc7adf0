//! Display format of `AppError` variants.

use interactive_feedback::AppError;

#[test]
fn variants_render_with_their_prefix() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Spawn("x".into()), "spawn: x"),
        (AppError::SessionLaunch("x".into()), "session launch: x"),
        (AppError::SessionTimeout("x".into()), "session timeout: x"),
        (AppError::ResultParse("x".into()), "result parse: x"),
        (AppError::ImageRead("x".into()), "image read: x"),
        (AppError::Mcp("x".into()), "mcp: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn empty_command_has_fixed_message() {
    assert_eq!(
        AppError::EmptyCommand.to_string(),
        "empty command: nothing to run"
    );
}

#[test]
fn io_errors_convert_to_io_variant() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg.contains("gone")));
}

#[test]
fn json_errors_convert_to_result_parse() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    let err: AppError = json_err.into();
    assert!(err.to_string().starts_with("result parse:"));
}

#[test]
fn messages_have_no_trailing_period() {
    let err = AppError::SessionTimeout("feedback worker did not finish within 600 seconds".into());
    assert!(!err.to_string().ends_with('.'));
}
