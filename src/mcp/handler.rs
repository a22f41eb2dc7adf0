//! MCP server handler, shared application state, and tool router.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::{
    tool::{ToolCallContext, ToolRoute, ToolRouter},
    ServerHandler,
};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use tokio::sync::Mutex;
use tracing::info_span;

use crate::config::GlobalConfig;
use crate::orchestrator::session_transport::{SessionTransport, SESSION_TIMEOUT};

/// Name of the feedback session tool.
pub const INTERACTIVE_FEEDBACK_TOOL: &str = "interactive_feedback";

/// Name of the image metadata tool.
pub const GET_IMAGE_INFO_TOOL: &str = "get_image_info";

/// Shared application state accessible by all MCP tool handlers.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Worker session transport. The lock admits one session at a time.
    pub transport: Mutex<SessionTransport>,
    /// Round-trip bound for one `interactive_feedback` call.
    pub session_timeout: Duration,
}

impl AppState {
    /// Build state with a transport for the configured worker.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>) -> Self {
        let transport = SessionTransport::from_config(&config);
        Self::with_transport(config, transport)
    }

    /// Build state around an existing transport.
    #[must_use]
    pub fn with_transport(config: Arc<GlobalConfig>, transport: SessionTransport) -> Self {
        Self {
            config,
            transport: Mutex::new(transport),
            session_timeout: SESSION_TIMEOUT,
        }
    }

    /// Override the session round-trip bound.
    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }
}

/// MCP server exposing the feedback tools.
pub struct FeedbackServer {
    state: Arc<AppState>,
}

impl FeedbackServer {
    /// Create a new MCP server bound to shared application state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Access the shared application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    fn tool_router() -> ToolRouter<Self> {
        let mut router = ToolRouter::new();

        for tool in Self::all_tools() {
            let name = tool.name.to_string();
            match name.as_str() {
                INTERACTIVE_FEEDBACK_TOOL => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::interactive_feedback::handle(context))
                    }));
                }
                GET_IMAGE_INFO_TOOL => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::get_image_info::handle(context))
                    }));
                }
                _ => {
                    router.add_route(ToolRoute::new_dyn(tool, |_context| {
                        Box::pin(async {
                            Err(rmcp::ErrorData::internal_error(
                                "tool not implemented",
                                None,
                            ))
                        })
                    }));
                }
            }
        }

        router
    }

    /// Convert a `serde_json::Value::Object` into the `Arc<Map>` expected by `Tool`.
    fn schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
        match value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::default()),
        }
    }

    /// Every tool this server advertises.
    #[must_use]
    pub fn all_tools() -> Vec<Tool> {
        vec![
            Tool::new(
                INTERACTIVE_FEEDBACK_TOOL,
                "Open an interactive feedback session for the user. Shows the summary of \
                 the work, lets the user run the project command and reply with text \
                 and images. Blocks until the user submits or closes the session \
                 (10 minute limit).",
                Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "project_directory": {
                            "type": "string",
                            "description": "Project directory; defaults to the server's working directory",
                            "default": ""
                        },
                        "summary": {
                            "type": "string",
                            "description": "Summary of the work done so far",
                            "default": ""
                        },
                        "theme": {
                            "type": "string",
                            "enum": ["light", "dark"],
                            "default": "light"
                        }
                    }
                })),
            ),
            Tool::new(
                GET_IMAGE_INFO_TOOL,
                "Describe an image file: name, format, dimensions, color mode and size.",
                Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "image_path": {
                            "type": "string",
                            "description": "Path of the image file"
                        }
                    },
                    "required": ["image_path"]
                })),
            ),
        ]
    }
}

impl ServerHandler for FeedbackServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Call interactive_feedback when you need the user's review or input \
                 before continuing."
                    .into(),
            ),
            ..Default::default()
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_ {
        let router = Self::tool_router();
        let _span = info_span!("call_tool", tool = %request.name).entered();

        async move {
            router
                .call(ToolCallContext::new(self, request, context))
                .await
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_ {
        let tools = Self::all_tools();

        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }
}
