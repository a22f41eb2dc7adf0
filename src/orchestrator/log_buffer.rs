//! Append-only command log shared between stream readers and the display.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Origin of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    /// Child standard output.
    Stdout,
    /// Child standard error.
    Stderr,
    /// Lines produced by the runner itself (echo, exit code, errors).
    System,
}

impl Display for OutputStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::System => "system",
        })
    }
}

/// One captured line, including its trailing newline when it had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Stream the line came from.
    pub stream: OutputStream,
    /// Line text.
    pub text: String,
}

/// Receiver of lines as they arrive, for real-time display.
pub trait LogSink: Send + Sync {
    /// Called once per appended line.
    fn on_line(&self, line: &LogLine);
}

impl LogSink for mpsc::UnboundedSender<LogLine> {
    fn on_line(&self, line: &LogLine) {
        // A closed display is not an error for the command.
        let _ = self.send(line.clone());
    }
}

/// Sink that discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn on_line(&self, _line: &LogLine) {}
}

/// Thread-safe ordered log. Appending is the only mutation besides
/// [`LogBuffer::clear`]; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl LogBuffer {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn append(&self, stream: OutputStream, text: impl Into<String>) -> LogLine {
        let line = LogLine {
            stream,
            text: text.into(),
        };
        self.guard().push(line.clone());
        line
    }

    /// Copy of every line captured so far.
    #[must_use]
    pub fn lines(&self) -> Vec<LogLine> {
        self.guard().clone()
    }

    /// Lines of a single stream, in arrival order.
    #[must_use]
    pub fn stream_lines(&self, stream: OutputStream) -> Vec<String> {
        self.guard()
            .iter()
            .filter(|line| line.stream == stream)
            .map(|line| line.text.clone())
            .collect()
    }

    /// Concatenation of all lines in insertion order.
    #[must_use]
    pub fn contents(&self) -> String {
        self.guard().iter().map(|line| line.text.as_str()).collect()
    }

    /// Number of captured lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Drop every captured line.
    pub fn clear(&self) {
        self.guard().clear();
    }

    fn guard(&self) -> MutexGuard<'_, Vec<LogLine>> {
        // Appends cannot leave the vector half-written, so a poisoned lock
        // still holds consistent data.
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
