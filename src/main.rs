#![forbid(unsafe_code)]

//! `mini-claw`: Telegram bot bridging chats to a local coding-agent CLI.
//!
//! Bootstraps configuration and credentials, prepares the workspace and
//! session directories, then long-polls Telegram until shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use mini_claw::bot::Bot;
use mini_claw::config::GlobalConfig;
use mini_claw::persistence::retention;
use mini_claw::telegram::client::TelegramClient;
use mini_claw::telegram::poller;
use mini_claw::workspace::path_safety;
use mini_claw::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mini-claw", about = "Telegram bot for a local coding agent", version, long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the default workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("mini-claw bootstrap");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let home = home_dir()?;
    let env = |key: &str| std::env::var(key).ok();
    let mut config = GlobalConfig::load(args.config.as_deref(), &home, env)?;

    if let Some(ws) = args.workspace {
        config.workspace_root = absolute(&path_safety::expand_home(&ws, &home))?;
    }

    // Fail fast without a token.
    config.load_credentials(env).await?;

    let config = Arc::new(config);
    info!(
        workspace = %config.workspace_root.display(),
        sessions = %config.session_dir.display(),
        thinking = %config.thinking_level,
        allowed_users = config.allowed_users.len(),
        "configuration loaded"
    );

    // ── Prepare directories and probe the agent ─────────
    let bot = Arc::new(Bot::new(Arc::clone(&config)));
    bot.prepare().await?;

    if bot.agent().check_available().await {
        info!(program = %config.agent.program, "agent CLI available");
    } else {
        warn!(
            program = %config.agent.program,
            "agent CLI not installed or not authenticated; prompts will fail until it is"
        );
    }

    // ── Telegram client ─────────────────────────────────
    let client = Arc::new(TelegramClient::new(&config.telegram)?);
    if let Err(err) = client.set_my_commands(&poller::menu_commands()).await {
        warn!(%err, "failed to publish command menu");
    }

    // ── Start retention service ──────────────────────────
    let ct = CancellationToken::new();
    let retention_handle = (config.sessions.cleanup_interval_seconds > 0).then(|| {
        info!(
            every_seconds = config.sessions.cleanup_interval_seconds,
            "retention service started"
        );
        retention::spawn_retention_task(
            Arc::clone(bot.sessions()),
            config.sessions.retention_per_chat,
            Duration::from_secs(config.sessions.cleanup_interval_seconds),
            ct.clone(),
        )
    });

    // ── Start polling ───────────────────────────────────
    let poll_handle = tokio::spawn(poller::run(
        Arc::clone(&bot),
        Arc::clone(&client),
        config.telegram.poll_timeout_seconds,
        ct.clone(),
    ));
    info!("mini-claw ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Err(err) = poll_handle.await {
        warn!(%err, "poller task ended abnormally");
    }
    if let Some(handle) = retention_handle {
        if let Err(err) = handle.await {
            warn!(%err, "retention task ended abnormally");
        }
    }
    info!("mini-claw shut down");

    Ok(())
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| AppError::Config("cannot determine home directory".into()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path_safety::normalize(path));
    }
    let cwd = std::env::current_dir()
        .map_err(|err| AppError::Config(format!("invalid workspace override: {err}")))?;
    Ok(path_safety::normalize(&cwd.join(path)))
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
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
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
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

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
