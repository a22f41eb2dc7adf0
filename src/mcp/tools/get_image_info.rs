//! `get_image_info` MCP tool handler.

use std::path::PathBuf;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::{CallToolResult, Content};
use tracing::debug;

use crate::content::image_info;
use crate::mcp::handler::FeedbackServer;

#[derive(Debug, serde::Deserialize)]
struct GetImageInfoInput {
    image_path: String,
}

/// Handle the `get_image_info` tool call.
///
/// Missing or undecodable files are reported in the text result, not as
/// protocol errors.
///
/// # Errors
///
/// Returns `rmcp::ErrorData::invalid_params` when `image_path` is missing,
/// and `internal_error` if the blocking read task fails.
pub async fn handle(
    context: ToolCallContext<'_, FeedbackServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let args: serde_json::Map<String, serde_json::Value> = context.arguments.unwrap_or_default();
    let input: GetImageInfoInput = serde_json::from_value(serde_json::Value::Object(args))
        .map_err(|err| {
            rmcp::ErrorData::invalid_params(format!("invalid get_image_info parameters: {err}"), None)
        })?;

    let path = PathBuf::from(input.image_path);
    debug!(path = %path.display(), "describing image");
    let info = tokio::task::spawn_blocking(move || image_info(&path))
        .await
        .map_err(|err| {
            rmcp::ErrorData::internal_error(format!("image info task failed: {err}"), None)
        })?;

    Ok(CallToolResult::success(vec![Content::text(info)]))
}
