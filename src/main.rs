#![forbid(unsafe_code)]

//! `interactive-feedback`: MCP server binary.
//!
//! Loads configuration and serves the feedback tools over stdio until the
//! client disconnects or a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use interactive_feedback::config::GlobalConfig;
use interactive_feedback::mcp::handler::AppState;
use interactive_feedback::mcp::transport;
use interactive_feedback::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "interactive-feedback",
    about = "MCP server collecting interactive user feedback",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json). Logs always go to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("interactive-feedback server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match args.config {
        Some(ref path) => {
            let mut config = GlobalConfig::load_from_path(path)?;
            let shared = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            config.share_with_console_worker(&shared);
            config
        }
        None => GlobalConfig::default(),
    };
    let config = Arc::new(config);
    info!(
        worker = %config.worker_program().display(),
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(Arc::clone(&config)));

    let ct = CancellationToken::new();
    let stdio_ct = ct.clone();
    let mut stdio_handle = tokio::spawn(transport::serve_stdio(state, stdio_ct));

    info!("MCP server ready");

    tokio::select! {
        joined = &mut stdio_handle => {
            match joined {
                Ok(Ok(())) => info!("client disconnected"),
                Ok(Err(err)) => error!(%err, "stdio transport failed"),
                Err(err) => error!(%err, "stdio transport task panicked"),
            }
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            if let Err(err) = stdio_handle.await {
                error!(%err, "stdio transport task panicked");
            }
        }
    }

    info!("interactive-feedback shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
