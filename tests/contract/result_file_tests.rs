//! Contract tests for the result file exchanged with workers.
//!
//! Any worker, not only the bundled console, must be able to produce this
//! format, so the field names and the nested encoding are fixed.

use serde_json::json;

use interactive_feedback::models::feedback::{FeedbackPayload, ResultFile, SessionResult};

#[test]
fn outer_object_has_two_string_fields() {
    let result = SessionResult::new(
        "log\n".into(),
        FeedbackPayload::new("text".into(), vec!["/a.png".into()]),
    );
    let encoded: serde_json::Value =
        serde_json::from_str(&result.to_slot_json().expect("encode")).expect("json");

    let object = encoded.as_object().expect("object");
    assert_eq!(object.len(), 2);
    assert_eq!(object["command_logs"], "log\n");
    assert!(object["interactive_feedback"].is_string());
}

#[test]
fn nested_payload_has_text_and_images() {
    let result = SessionResult::new(
        String::new(),
        FeedbackPayload::new("text".into(), vec!["/a.png".into(), "/b.jpg".into()]),
    );
    let outer: ResultFile =
        serde_json::from_str(&result.to_slot_json().expect("encode")).expect("outer");
    let nested: serde_json::Value =
        serde_json::from_str(&outer.interactive_feedback).expect("nested json");

    assert_eq!(
        nested,
        json!({ "text_feedback": "text", "images": ["/a.png", "/b.jpg"] })
    );
}

#[test]
fn third_party_worker_output_is_accepted() {
    let nested = json!({ "text_feedback": "from a GUI", "images": [] }).to_string();
    let raw = json!({ "command_logs": "", "interactive_feedback": nested }).to_string();

    let result = SessionResult::from_slot_json(&raw).expect("parse");
    assert_eq!(result.feedback.text_feedback, "from a GUI");
    assert!(result.feedback.images.is_empty());
}

#[test]
fn missing_fields_default_to_empty() {
    let result = SessionResult::from_slot_json("{}").expect("parse");
    assert!(result.command_logs.is_empty());
    assert!(result.feedback.is_empty());
}
