//! Worker session transport.
//!
//! Launches the worker (presentation layer) with the serialized request,
//! waits for it to exit within a bounded timeout, and retrieves the result
//! through a one-shot file hand-off:
//!
//! 1. A fresh scratch directory is created exclusively for the session. The
//!    result slot is `<scratch>/result.json` and does not exist yet.
//! 2. The worker writes the slot atomically on submit, or writes nothing on
//!    cancel.
//! 3. After exit the transport reads and deletes the slot. A missing slot is
//!    a cancellation, not an error.
//!
//! On timeout the worker's process tree is reaped and the session fails
//! with `AppError::SessionTimeout`. The scratch directory travels with the
//! returned [`SessionResult`] so captured images outlive packaging and are
//! removed together with it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::models::feedback::{SessionResult, SessionScratch};
use crate::models::session::{SessionRequest, SessionState};
use crate::orchestrator::command_runner::{drain_readers, pump_stream};
use crate::orchestrator::log_buffer::{LogBuffer, LogLine, LogSink, NullSink, OutputStream};
use crate::orchestrator::reaper::{ProcessReaper, SystemReaper};
use crate::{AppError, Result};

/// Round-trip bound for one feedback session.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// File name of the result slot inside the session scratch directory.
pub const RESULT_SLOT_NAME: &str = "result.json";

/// How long to wait for the worker's output pipes to drain after exit.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How long to wait for a reaped worker to be collected.
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Executable and leading arguments used to launch the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Worker executable.
    pub program: PathBuf,
    /// Arguments placed before the session arguments.
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Worker command with no leading arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append leading arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Traces worker stderr lines; they are diagnostics, not command logs.
struct WorkerStderrSink;

impl LogSink for WorkerStderrSink {
    fn on_line(&self, line: &LogLine) {
        debug!(line = line.text.trim_end(), "worker stderr");
    }
}

/// Runs one worker session at a time and tracks its lifecycle state.
pub struct SessionTransport {
    worker: WorkerCommand,
    reaper: Arc<dyn ProcessReaper>,
    state: SessionState,
}

impl SessionTransport {
    /// Create a transport launching `worker`.
    #[must_use]
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            worker,
            reaper: Arc::new(SystemReaper),
            state: SessionState::Idle,
        }
    }

    /// Create a transport for the worker named in `config`.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            WorkerCommand::new(config.worker_program()).with_args(config.worker.args.clone()),
        )
    }

    /// Replace the process-tree reaper.
    #[must_use]
    pub fn with_reaper(mut self, reaper: Arc<dyn ProcessReaper>) -> Self {
        self.reaper = reaper;
        self
    }

    /// State of the most recent session attempt.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one feedback session and return its result.
    ///
    /// A worker that exits without writing the result slot is treated as a
    /// user cancellation and yields an empty payload.
    ///
    /// # Errors
    ///
    /// - `AppError::SessionLaunch` if the scratch directory or the worker
    ///   process cannot be created.
    /// - `AppError::SessionTimeout` if the worker is still running after
    ///   `timeout`; its process tree is reaped first.
    /// - `AppError::ResultParse` if the result slot holds invalid content.
    pub async fn run_session(
        &mut self,
        request: &SessionRequest,
        timeout: Duration,
    ) -> Result<SessionResult> {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "run_session",
            session_id = %session_id,
            project = %request.project_directory().display(),
            theme = %request.theme(),
        );
        self.run_attempt(request, timeout).instrument(span).await
    }

    async fn run_attempt(
        &mut self,
        request: &SessionRequest,
        timeout: Duration,
    ) -> Result<SessionResult> {
        if self.state.is_terminal() {
            self.transition(SessionState::Idle);
        }
        self.transition(SessionState::Launching);

        let scratch_dir = match tempfile::Builder::new()
            .prefix("interactive-feedback-")
            .tempdir()
        {
            Ok(dir) => dir,
            Err(err) => {
                self.transition(SessionState::LaunchFailed);
                return Err(AppError::SessionLaunch(format!(
                    "failed to allocate result slot: {err}"
                )));
            }
        };
        let slot = scratch_dir.path().join(RESULT_SLOT_NAME);
        let scratch = SessionScratch::new(scratch_dir);

        let mut cmd = Command::new(&self.worker.program);
        cmd.args(&self.worker.args)
            .args(request.worker_args(&slot))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.transition(SessionState::LaunchFailed);
                // Dropping the scratch removes the (unwritten) slot with it.
                drop(scratch);
                return Err(AppError::SessionLaunch(format!(
                    "failed to start worker {}: {err}",
                    self.worker.program.display()
                )));
            }
        };

        let Some(pid) = child.id() else {
            self.transition(SessionState::LaunchFailed);
            return Err(AppError::SessionLaunch(format!(
                "worker {} has no process id after spawn",
                self.worker.program.display()
            )));
        };
        info!(pid, worker = %self.worker.program.display(), "worker launched");
        self.transition(SessionState::AwaitingResult);

        let side_log = LogBuffer::new();
        let cancel = CancellationToken::new();
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump_stream(
                OutputStream::Stdout,
                stdout,
                side_log.clone(),
                Arc::new(NullSink),
                cancel.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump_stream(
                OutputStream::Stderr,
                stderr,
                LogBuffer::new(),
                Arc::new(WorkerStderrSink),
                cancel.clone(),
            )));
        }

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, exit_code = ?status.code(), "worker exited");
                if !status.success() {
                    warn!(pid, exit_code = ?status.code(), "worker exited unsuccessfully");
                }
            }
            Ok(Err(err)) => {
                warn!(pid, %err, "failed to wait for worker; checking result slot anyway");
            }
            Err(_elapsed) => {
                warn!(pid, timeout_secs = timeout.as_secs(), "worker timed out");
                cancel.cancel();
                let reaper = Arc::clone(&self.reaper);
                if let Err(err) =
                    tokio::task::spawn_blocking(move || reaper.terminate_tree(pid)).await
                {
                    warn!(pid, %err, "reaper task failed");
                }
                if tokio::time::timeout(REAP_GRACE, child.wait()).await.is_err() {
                    warn!(pid, "reaped worker was not collected in time");
                }
                remove_slot(&slot).await;
                drop(scratch);
                self.transition(SessionState::TimedOut);
                return Err(AppError::SessionTimeout(format!(
                    "feedback worker did not finish within {} seconds",
                    timeout.as_secs()
                )));
            }
        }

        drain_readers(readers, DRAIN_GRACE, &cancel).await;

        self.retrieve(&slot, side_log, scratch).await
    }

    async fn retrieve(
        &mut self,
        slot: &Path,
        side_log: LogBuffer,
        scratch: SessionScratch,
    ) -> Result<SessionResult> {
        let raw = match tokio::fs::read_to_string(slot).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no result written; session cancelled by user");
                self.transition(SessionState::Cancelled);
                return Ok(SessionResult::cancelled(side_log.contents()).with_scratch(scratch));
            }
            Err(err) => {
                remove_slot(slot).await;
                self.transition(SessionState::Completed);
                return Err(AppError::ResultParse(format!(
                    "cannot read result slot: {err}"
                )));
            }
        };

        remove_slot(slot).await;
        self.transition(SessionState::Completed);

        let result = SessionResult::from_slot_json(&raw)?;
        info!(
            images = result.feedback.images.len(),
            has_text = !result.feedback.text_feedback.trim().is_empty(),
            "session result retrieved"
        );
        Ok(result.with_scratch(scratch))
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            debug!(from = ?self.state, to = ?next, "session state transition");
        } else {
            warn!(from = ?self.state, to = ?next, "unexpected session state transition");
        }
        self.state = next;
    }
}

async fn remove_slot(slot: &Path) {
    match tokio::fs::remove_file(slot).await {
        Ok(()) => debug!(slot = %slot.display(), "result slot removed"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(slot = %slot.display(), %err, "failed to remove result slot"),
    }
}
