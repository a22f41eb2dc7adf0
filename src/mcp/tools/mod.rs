//! MCP tool handlers.

pub mod get_image_info;
pub mod interactive_feedback;
