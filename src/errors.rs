//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A user command could not be spawned (bad executable, permission, cwd).
    Spawn(String),
    /// The user asked to run a blank command.
    EmptyCommand,
    /// The worker process could not be started.
    SessionLaunch(String),
    /// The worker did not exit within the session timeout.
    SessionTimeout(String),
    /// The result slot content is not a valid session result.
    ResultParse(String),
    /// A single feedback image could not be read.
    ImageRead(String),
    /// MCP protocol or tool dispatch failure.
    Mcp(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::EmptyCommand => write!(f, "empty command: nothing to run"),
            Self::SessionLaunch(msg) => write!(f, "session launch: {msg}"),
            Self::SessionTimeout(msg) => write!(f, "session timeout: {msg}"),
            Self::ResultParse(msg) => write!(f, "result parse: {msg}"),
            Self::ImageRead(msg) => write!(f, "image read: {msg}"),
            Self::Mcp(msg) => write!(f, "mcp: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(format!("failed to serialize settings: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResultParse(err.to_string())
    }
}
