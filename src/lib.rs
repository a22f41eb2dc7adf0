#![forbid(unsafe_code)]

//! Interactive feedback orchestrator.
//!
//! Lets an agent pause for human review over MCP: a worker process shows
//! the agent's summary, optionally runs the project command with live
//! output, and hands the user's text and images back as protocol content.

pub mod config;
pub mod content;
pub mod errors;
pub mod mcp;
pub mod models;
pub mod orchestrator;
pub mod worker;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
