//! User command runner.
//!
//! Runs one shell command at a time in the project directory, streaming
//! stdout and stderr line by line into a shared [`LogBuffer`] and a live
//! [`LogSink`]. A liveness task polls the child on a fixed interval and
//! publishes the first observed exit through a `watch` channel. Stopping a
//! command routes through the [`ProcessReaper`] so shell descendants die
//! with it.

use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use crate::orchestrator::log_buffer::{LogBuffer, LogSink, NullSink, OutputStream};
use crate::orchestrator::output_codec::OutputLineCodec;
use crate::orchestrator::reaper::{ProcessReaper, SystemReaper};
use crate::{AppError, Result};

/// Default interval between liveness polls.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest accepted liveness poll interval.
pub const MIN_LIVENESS_INTERVAL: Duration = Duration::from_millis(1);

/// How long the liveness task waits for the readers to drain after exit.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle of a spawned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Still running.
    Running,
    /// Exited on its own. Signal deaths report the negated signal number.
    Exited(i32),
    /// Stopped through the runner.
    Killed,
}

/// Read-only view of the runner's current process.
///
/// Only the [`CommandRunner`] can stop the process; the handle observes it.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    status: watch::Receiver<ProcessStatus>,
}

impl ProcessHandle {
    /// OS process id of the shell.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Latest observed status.
    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    /// Whether the process is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status() == ProcessStatus::Running
    }

    /// Wait until the process leaves [`ProcessStatus::Running`].
    pub async fn wait(&mut self) -> ProcessStatus {
        let observed = self
            .status
            .wait_for(|status| *status != ProcessStatus::Running)
            .await
            .map(|status| *status);
        // A dropped sender means the runner is gone; report the last value.
        observed.unwrap_or_else(|_| *self.status.borrow())
    }
}

struct ActiveProcess {
    pid: u32,
    cancel: CancellationToken,
    status_tx: Arc<watch::Sender<ProcessStatus>>,
    status_rx: watch::Receiver<ProcessStatus>,
    liveness: JoinHandle<()>,
}

impl ActiveProcess {
    fn handle(&self) -> ProcessHandle {
        ProcessHandle {
            pid: self.pid,
            status: self.status_rx.clone(),
        }
    }

    fn is_running(&self) -> bool {
        *self.status_rx.borrow() == ProcessStatus::Running
    }

    /// Mark the process killed unless it already exited.
    fn mark_killed(&self) {
        self.status_tx.send_if_modified(|status| {
            if *status == ProcessStatus::Running {
                *status = ProcessStatus::Killed;
                true
            } else {
                false
            }
        });
    }
}

/// Runs at most one user command at a time.
pub struct CommandRunner {
    log: LogBuffer,
    sink: Arc<dyn LogSink>,
    reaper: Arc<dyn ProcessReaper>,
    liveness_interval: Duration,
    active: Option<ActiveProcess>,
}

impl CommandRunner {
    /// Create a runner writing into `log` and forwarding lines to `sink`.
    #[must_use]
    pub fn new(log: LogBuffer, sink: Arc<dyn LogSink>) -> Self {
        Self {
            log,
            sink,
            reaper: Arc::new(SystemReaper),
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            active: None,
        }
    }

    /// Create a runner with a private log and no live display.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(LogBuffer::new(), Arc::new(NullSink))
    }

    /// Replace the process-tree reaper.
    #[must_use]
    pub fn with_reaper(mut self, reaper: Arc<dyn ProcessReaper>) -> Self {
        self.reaper = reaper;
        self
    }

    /// Override the liveness poll interval, clamped to
    /// [`MIN_LIVENESS_INTERVAL`].
    #[must_use]
    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval.max(MIN_LIVENESS_INTERVAL);
        self
    }

    /// Shared log of every line captured so far.
    #[must_use]
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Empty the captured log.
    pub fn clear_logs(&self) {
        self.log.clear();
    }

    /// Handle of the current (or last) process, if any.
    #[must_use]
    pub fn handle(&self) -> Option<ProcessHandle> {
        self.active.as_ref().map(ActiveProcess::handle)
    }

    /// Whether a command is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(ActiveProcess::is_running)
    }

    /// Spawn `command` through the platform shell.
    ///
    /// A running command is stopped first, so calling `start` twice
    /// restarts rather than failing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::EmptyCommand` for a blank command and
    /// `AppError::Spawn` when the shell cannot be started. Both are also
    /// recorded as a single log line.
    pub async fn start(
        &mut self,
        command: &str,
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ProcessHandle> {
        self.stop().await;

        let command = command.trim();
        if command.is_empty() {
            self.emit(OutputStream::System, "Please enter a command to run\n");
            return Err(AppError::EmptyCommand);
        }

        self.emit(OutputStream::System, format!("$ {command}\n"));

        let mut cmd = shell_command(command);
        cmd.current_dir(cwd)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(command, cwd = %cwd.display(), %err, "failed to spawn command");
                self.emit(
                    OutputStream::System,
                    format!("Error running command: {err}\n"),
                );
                return Err(AppError::Spawn(format!("failed to run `{command}`: {err}")));
            }
        };

        let Some(pid) = child.id() else {
            // Dropping the child reaps it through `kill_on_drop`.
            self.emit(
                OutputStream::System,
                "Error running command: process exited before it could be tracked\n",
            );
            return Err(AppError::Spawn(format!(
                "`{command}` has no process id after spawn"
            )));
        };
        let span = info_span!("command_runner.start", pid, command);
        let _guard = span.enter();

        let cancel = CancellationToken::new();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(self.spawn_reader(OutputStream::Stdout, stdout, cancel.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(self.spawn_reader(OutputStream::Stderr, stderr, cancel.clone()));
        }

        let (status_tx, status_rx) = watch::channel(ProcessStatus::Running);
        let status_tx = Arc::new(status_tx);
        let liveness = tokio::spawn(watch_liveness(LivenessTask {
            child,
            readers,
            log: self.log.clone(),
            sink: Arc::clone(&self.sink),
            status_tx: Arc::clone(&status_tx),
            interval: self.liveness_interval,
            cancel: cancel.clone(),
        }));

        info!("command started");

        let active = ActiveProcess {
            pid,
            cancel,
            status_tx,
            status_rx,
            liveness,
        };
        let handle = active.handle();
        self.active = Some(active);
        Ok(handle)
    }

    /// Stop the current command and its descendants, then discard the
    /// handle. Does nothing when no command was started.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        if active.is_running() {
            active.mark_killed();
            active.cancel.cancel();
            let reaper = Arc::clone(&self.reaper);
            let pid = active.pid;
            if let Err(err) =
                tokio::task::spawn_blocking(move || reaper.terminate_tree(pid)).await
            {
                warn!(pid, %err, "reaper task failed");
            }
            info!(pid, "command stopped");
        } else {
            active.cancel.cancel();
        }

        if let Err(err) = active.liveness.await {
            debug!(%err, "liveness task ended abnormally");
        }
    }

    fn emit(&self, stream: OutputStream, text: impl Into<String>) {
        let line = self.log.append(stream, text);
        self.sink.on_line(&line);
    }

    fn spawn_reader<R>(
        &self,
        stream: OutputStream,
        reader: R,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let log = self.log.clone();
        let sink = Arc::clone(&self.sink);
        tokio::spawn(pump_stream(stream, reader, log, sink, cancel))
    }
}

impl Drop for CommandRunner {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if active.is_running() {
                active.mark_killed();
                self.reaper.terminate_tree(active.pid);
            }
        }
    }
}

/// Forward every line of one stream into the log and the sink.
///
/// I/O errors end the reader without failing the command.
pub(crate) async fn pump_stream<R>(
    stream: OutputStream,
    reader: R,
    log: LogBuffer,
    sink: Arc<dyn LogSink>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, OutputLineCodec::new());
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            item = framed.next() => match item {
                None => break,
                Some(Ok(text)) => {
                    let line = log.append(stream, text);
                    sink.on_line(&line);
                }
                Some(Err(err)) => {
                    warn!(%stream, %err, "output stream read failed");
                    break;
                }
            },
        }
    }
    debug!(%stream, "output reader finished");
}

/// Give every reader `grace` to reach end of stream, then cancel and join
/// the ones still open.
///
/// Readers held open by a backgrounded descendant are closed this way; once
/// this returns no reader appends to its log again.
pub(crate) async fn drain_readers(
    readers: Vec<JoinHandle<()>>,
    grace: Duration,
    cancel: &CancellationToken,
) {
    let still_open = join_all(readers.into_iter().map(|mut reader| async move {
        match tokio::time::timeout(grace, &mut reader).await {
            Ok(_) => None,
            Err(_elapsed) => Some(reader),
        }
    }))
    .await;

    cancel.cancel();
    for reader in still_open.into_iter().flatten() {
        debug!("output stream still open after exit, closing it");
        if let Err(err) = reader.await {
            debug!(%err, "output reader ended abnormally");
        }
    }
}

struct LivenessTask {
    child: Child,
    readers: Vec<JoinHandle<()>>,
    log: LogBuffer,
    sink: Arc<dyn LogSink>,
    status_tx: Arc<watch::Sender<ProcessStatus>>,
    interval: Duration,
    cancel: CancellationToken,
}

/// Poll the child until it exits or the runner cancels.
async fn watch_liveness(mut task: LivenessTask) {
    let mut ticker = tokio::time::interval(task.interval);
    let exit = loop {
        tokio::select! {
            () = task.cancel.cancelled() => return,
            _ = ticker.tick() => match task.child.try_wait() {
                Ok(Some(status)) => break exit_code(status),
                Ok(None) => {}
                Err(err) => {
                    warn!(%err, "failed to poll command status");
                    return;
                }
            },
        }
    };

    // Nothing may land in the log after the exit line.
    drain_readers(task.readers, DRAIN_GRACE, &task.cancel).await;

    // The exit line lands in the log before waiters observe the new status.
    let recorded = task.status_tx.send_if_modified(|status| {
        if *status != ProcessStatus::Running {
            return false;
        }
        let line = task.log.append(
            OutputStream::System,
            format!("\nProcess exited with code {exit}\n"),
        );
        task.sink.on_line(&line);
        *status = ProcessStatus::Exited(exit);
        true
    });
    if recorded {
        info!(exit_code = exit, "command exited");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }

    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// The caller's environment as a plain string map, skipping entries that
/// are not valid UTF-8.
#[must_use]
pub fn user_environment() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}
