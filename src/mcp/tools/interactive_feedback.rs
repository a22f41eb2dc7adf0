//! `interactive_feedback` MCP tool handler.
//!
//! Runs one worker session and returns the user's feedback as content
//! blocks. Sessions are serialized: a second call waits for the first to
//! finish.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::{CallToolResult, Content};
use tracing::{info, info_span, Instrument};

use crate::content::package;
use crate::mcp::handler::{AppState, FeedbackServer};
use crate::models::content::ContentBlock;
use crate::models::session::SessionRequest;
use crate::AppError;

/// Input parameters. Every field is optional.
#[derive(Debug, Default, serde::Deserialize)]
struct InteractiveFeedbackInput {
    project_directory: Option<String>,
    summary: Option<String>,
    theme: Option<String>,
}

/// Handle the `interactive_feedback` tool call.
///
/// # Errors
///
/// See [`run`].
pub async fn handle(
    context: ToolCallContext<'_, FeedbackServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let state = Arc::clone(context.service.state());
    run(&state, context.arguments).await
}

/// Run one feedback session for the given tool arguments.
///
/// # Errors
///
/// Returns `rmcp::ErrorData::invalid_params` for malformed arguments and
/// `internal_error` when the session cannot launch, times out or returns an
/// unreadable result. A cancelled session is not an error.
pub async fn run(
    state: &AppState,
    arguments: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let input: InteractiveFeedbackInput =
        serde_json::from_value(serde_json::Value::Object(arguments.unwrap_or_default()))
            .map_err(|err| {
                rmcp::ErrorData::invalid_params(
                    format!("invalid interactive_feedback parameters: {err}"),
                    None,
                )
            })?;

    let request = SessionRequest::from_raw(
        input.project_directory.as_deref(),
        input.summary.as_deref(),
        input.theme.as_deref(),
        &state.config.feedback.default_summary,
    );

    let span = info_span!(
        "interactive_feedback",
        project = %request.project_directory().display(),
        theme = %request.theme(),
    );

    async move {
        let result = {
            let mut transport = state.transport.lock().await;
            transport.run_session(&request, state.session_timeout).await
        };

        let result = result.map_err(|err| match err {
            AppError::SessionTimeout(_) | AppError::SessionLaunch(_) | AppError::ResultParse(_) => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
            other => rmcp::ErrorData::internal_error(
                format!("interactive_feedback failed: {other}"),
                None,
            ),
        })?;

        let blocks = package(&result, &state.config.feedback.prefix).await;
        info!(
            blocks = blocks.len(),
            log_bytes = result.command_logs.len(),
            "interactive_feedback completed"
        );

        // Dropping the result removes the session scratch directory.
        let content: Vec<Content> = blocks.into_iter().map(ContentBlock::into_content).collect();
        drop(result);

        Ok(CallToolResult::success(content))
    }
    .instrument(span)
    .await
}
