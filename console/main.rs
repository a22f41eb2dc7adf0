#![forbid(unsafe_code)]

//! `interactive-feedback-console`: terminal feedback worker.
//!
//! Implements the worker side of a feedback session without a GUI: shows
//! the agent's summary, runs the project command with live output, and
//! collects text and image feedback line by line. When launched by the
//! server, stdin is closed and stdout is the command-log side channel, so
//! the conversation happens on the controlling terminal instead.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use interactive_feedback::config::GlobalConfig;
use interactive_feedback::models::feedback::SessionResult;
use interactive_feedback::models::session::SessionRequest;
use interactive_feedback::orchestrator::command_runner::{user_environment, CommandRunner};
use interactive_feedback::orchestrator::log_buffer::{LogBuffer, LogLine, LogSink};
use interactive_feedback::worker::args::WorkerArgs;
use interactive_feedback::worker::draft::{FeedbackDraft, TempImages};
use interactive_feedback::worker::result_writer::write_result;
use interactive_feedback::worker::settings::{ProjectSettings, SettingsStore};
use interactive_feedback::{AppError, Result};

const HELP: &str = "\
Commands:
  /run [command]   start the command (or stop it if running)
  /stop            stop the running command
  /save            remember the command and auto-run flag for this project
  /auto on|off     run the saved command when a session opens
  /image <path>    attach an image
  /capture <path>  attach a session-owned copy of an image
  /remove <n>      detach image number n
  /clear-images    detach every image
  /logs            show the captured command output
  /clear-logs      clear the captured command output
  /submit          send the feedback
  /cancel          close without sending
  /help            show this help
Any other line is added to the feedback text.";

fn main() -> Result<()> {
    let args = WorkerArgs::parse();
    init_tracing()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

/// The user-facing terminal.
struct Terminal {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Terminal {
    /// Use stdout when it is a terminal, otherwise the controlling terminal,
    /// falling back to stderr.
    fn open() -> Self {
        let out: Box<dyn Write + Send> = if std::io::stdout().is_terminal() {
            Box::new(std::io::stdout())
        } else {
            match controlling_terminal_writer() {
                Some(tty) => tty,
                None => Box::new(std::io::stderr()),
            }
        };
        Self {
            out: Mutex::new(out),
        }
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // The terminal going away must not abort the session.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn say(&self, text: impl AsRef<str>) {
        self.write(&format!("{}\n", text.as_ref()));
    }
}

#[cfg(unix)]
fn controlling_terminal_writer() -> Option<Box<dyn Write + Send>> {
    std::fs::OpenOptions::new()
        .write(true)
        .open("/dev/tty")
        .ok()
        .map(|tty| Box::new(tty) as Box<dyn Write + Send>)
}

#[cfg(not(unix))]
fn controlling_terminal_writer() -> Option<Box<dyn Write + Send>> {
    None
}

async fn open_input() -> Box<dyn AsyncRead + Unpin + Send> {
    if std::io::stdin().is_terminal() {
        return Box::new(tokio::io::stdin());
    }

    #[cfg(unix)]
    {
        match tokio::fs::File::open("/dev/tty").await {
            Ok(tty) => return Box::new(tty),
            Err(err) => warn!(%err, "no controlling terminal; reading stdin"),
        }
    }

    Box::new(tokio::io::stdin())
}

/// Shows command output live and mirrors it to the stdout side channel.
struct LiveOutput {
    terminal: Arc<Terminal>,
    side_channel: bool,
}

impl LogSink for LiveOutput {
    fn on_line(&self, line: &LogLine) {
        self.terminal.write(&line.text);
        if self.side_channel {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(line.text.as_bytes());
            let _ = stdout.flush();
        }
    }
}

/// State of one console session.
struct Session {
    request: SessionRequest,
    output_file: Option<PathBuf>,
    terminal: Arc<Terminal>,
    runner: CommandRunner,
    draft: FeedbackDraft,
    store: Option<SettingsStore>,
    settings: ProjectSettings,
}

enum Outcome {
    Continue,
    Submit,
    Cancel,
}

async fn run(args: WorkerArgs) -> Result<()> {
    let config = load_config(args.config.as_deref());
    let request = args.session_request(&config.feedback.default_summary);
    let terminal = Arc::new(Terminal::open());

    let sink = Arc::new(LiveOutput {
        terminal: Arc::clone(&terminal),
        side_channel: !std::io::stdout().is_terminal(),
    });
    let runner = CommandRunner::new(LogBuffer::new(), sink)
        .with_liveness_interval(config.liveness_interval());

    let captures = match args.output_file.as_deref().and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => TempImages::in_dir(dir),
        _ => TempImages::private()?,
    };

    let store = args
        .settings_file
        .clone()
        .map(SettingsStore::new)
        .or_else(SettingsStore::at_default_location);
    let settings = match store.as_ref() {
        Some(store) => store
            .load(request.project_directory())
            .unwrap_or_else(|err| {
                warn!(%err, "failed to load project settings, using defaults");
                ProjectSettings::default()
            }),
        None => ProjectSettings::default(),
    };

    let mut session = Session {
        request,
        output_file: args.output_file,
        terminal,
        runner,
        draft: FeedbackDraft::new(captures),
        store,
        settings,
    };

    session.greet();
    if session.settings.execute_automatically && !session.settings.run_command.trim().is_empty() {
        let command = session.settings.run_command.clone();
        session.start(&command).await;
    }

    let mut lines = BufReader::new(open_input().await).lines();
    let outcome = loop {
        session.terminal.write("> ");
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Outcome::Cancel,
            Err(err) => {
                warn!(%err, "failed to read input");
                break Outcome::Cancel;
            }
        };
        match session.handle_line(&line).await {
            Outcome::Continue => {}
            done => break done,
        }
    };

    session.runner.stop().await;
    match outcome {
        Outcome::Submit => session.submit(),
        Outcome::Cancel | Outcome::Continue => {
            info!("session cancelled");
            session.terminal.say("Feedback cancelled.");
            Ok(())
        }
    }
}

/// Shared server configuration; defaults when absent or unreadable.
fn load_config(path: Option<&Path>) -> GlobalConfig {
    let Some(path) = path else {
        return GlobalConfig::default();
    };
    GlobalConfig::load_from_path(path).unwrap_or_else(|err| {
        warn!(%err, config = %path.display(), "using default configuration");
        GlobalConfig::default()
    })
}

impl Session {
    fn greet(&self) {
        let t = &self.terminal;
        t.say("=== Interactive feedback ===");
        t.say(format!("Project: {}", self.request.project_directory().display()));
        t.say(format!("Theme:   {}", self.request.theme()));
        t.say("");
        t.say(self.request.summary());
        t.say("");
        if !self.settings.run_command.is_empty() {
            t.say(format!(
                "Saved command: {} (auto-run {})",
                self.settings.run_command,
                if self.settings.execute_automatically { "on" } else { "off" }
            ));
        }
        t.say("Type feedback, or /help for commands. /submit sends it.");
    }

    async fn handle_line(&mut self, line: &str) -> Outcome {
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            self.draft.push_line(line);
            return Outcome::Continue;
        };
        let (command, arg) = match rest.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (rest.trim(), ""),
        };

        match command {
            "run" => {
                if arg.is_empty() && self.runner.is_running() {
                    self.runner.stop().await;
                    self.terminal.say("Command stopped.");
                } else {
                    let command = if arg.is_empty() {
                        self.settings.run_command.clone()
                    } else {
                        self.settings.run_command = arg.to_owned();
                        arg.to_owned()
                    };
                    self.start(&command).await;
                }
            }
            "stop" => {
                if self.runner.is_running() {
                    self.runner.stop().await;
                    self.terminal.say("Command stopped.");
                } else {
                    self.terminal.say("No command is running.");
                }
            }
            "save" => self.save(),
            "auto" => match arg {
                "on" => self.settings.execute_automatically = true,
                "off" => self.settings.execute_automatically = false,
                _ => self.terminal.say("Usage: /auto on|off"),
            },
            "image" => self.attach(arg),
            "capture" => self.capture(arg),
            "remove" => self.remove(arg),
            "clear-images" => {
                self.draft.clear_images();
                self.terminal.say("All images removed.");
            }
            "logs" => self.terminal.write(&self.runner.log().contents()),
            "clear-logs" => {
                self.runner.clear_logs();
                self.terminal.say("Logs cleared.");
            }
            "submit" => return Outcome::Submit,
            "cancel" => return Outcome::Cancel,
            "help" => self.terminal.say(HELP),
            other => self.terminal.say(format!("Unknown command /{other}; try /help")),
        }
        Outcome::Continue
    }

    async fn start(&mut self, command: &str) {
        let env = user_environment();
        let cwd = self.request.project_directory().to_path_buf();
        // Failures are already reported on the live log.
        if let Err(err) = self.runner.start(command, &cwd, &env).await {
            warn!(%err, "command did not start");
        }
    }

    fn save(&self) {
        let Some(ref store) = self.store else {
            self.terminal.say("No settings location is available.");
            return;
        };
        match store.save(self.request.project_directory(), &self.settings) {
            Ok(()) => self.terminal.say("Project settings saved."),
            Err(err) => self.terminal.say(format!("Failed to save settings: {err}")),
        }
    }

    fn attach(&mut self, arg: &str) {
        if arg.is_empty() {
            self.terminal.say("Usage: /image <path>");
            return;
        }
        match self.draft.attach(PathBuf::from(arg)) {
            Ok(true) => self.list_images(),
            Ok(false) => self.terminal.say("Image already attached."),
            Err(err) => self.terminal.say(err.to_string()),
        }
    }

    fn capture(&mut self, arg: &str) {
        if arg.is_empty() {
            self.terminal.say("Usage: /capture <path>");
            return;
        }
        match self.draft.capture(Path::new(arg)) {
            Ok(_) => self.list_images(),
            Err(err) => self.terminal.say(err.to_string()),
        }
    }

    fn remove(&mut self, arg: &str) {
        let removed = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| self.draft.remove(index));
        match removed {
            Some(path) => self.terminal.say(format!("Removed {}", path.display())),
            None => self.terminal.say("Usage: /remove <n> (see the image list)"),
        }
    }

    fn list_images(&self) {
        for (n, path) in self.draft.images().iter().enumerate() {
            self.terminal.say(format!("  [{}] {}", n + 1, path.display()));
        }
    }

    fn submit(self) -> Result<()> {
        let Session {
            output_file,
            terminal,
            runner,
            draft,
            ..
        } = self;

        let result = SessionResult::new(runner.log().contents(), draft.into_payload());
        match output_file {
            Some(ref slot) => write_result(slot, &result)?,
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", result.to_slot_json()?)?;
            }
        }
        terminal.say("Feedback sent.");
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}
