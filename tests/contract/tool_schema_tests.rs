//! Contract tests for the advertised MCP tools.

use interactive_feedback::mcp::handler::{
    FeedbackServer, GET_IMAGE_INFO_TOOL, INTERACTIVE_FEEDBACK_TOOL,
};

fn tool(name: &str) -> rmcp::model::Tool {
    FeedbackServer::all_tools()
        .into_iter()
        .find(|tool| tool.name == name)
        .unwrap_or_else(|| panic!("tool {name} should be advertised"))
}

#[test]
fn exactly_two_tools_are_advertised() {
    let names: Vec<String> = FeedbackServer::all_tools()
        .iter()
        .map(|tool| tool.name.to_string())
        .collect();
    assert_eq!(names, vec!["interactive_feedback", "get_image_info"]);
}

#[test]
fn interactive_feedback_arguments_are_all_optional() {
    let schema = tool(INTERACTIVE_FEEDBACK_TOOL).input_schema;
    assert_eq!(schema["type"], "object");
    let properties = schema["properties"].as_object().expect("properties");
    for field in ["project_directory", "summary", "theme"] {
        assert_eq!(properties[field]["type"], "string", "{field} is a string");
    }
    assert!(schema.get("required").is_none());
}

#[test]
fn theme_is_light_or_dark_defaulting_to_light() {
    let schema = tool(INTERACTIVE_FEEDBACK_TOOL).input_schema;
    let theme = &schema["properties"]["theme"];
    assert_eq!(theme["enum"], serde_json::json!(["light", "dark"]));
    assert_eq!(theme["default"], "light");
}

#[test]
fn get_image_info_requires_image_path() {
    let schema = tool(GET_IMAGE_INFO_TOOL).input_schema;
    assert_eq!(schema["required"], serde_json::json!(["image_path"]));
    assert_eq!(schema["properties"]["image_path"]["type"], "string");
}

#[test]
fn every_tool_has_a_description() {
    for tool in FeedbackServer::all_tools() {
        let description = tool.description.expect("description");
        assert!(!description.is_empty(), "{} needs a description", tool.name);
    }
}
