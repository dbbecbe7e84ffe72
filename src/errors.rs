//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Subprocess failures are not represented here: a failed, timed-out or
/// unspawnable agent run is a normal result, see
/// [`crate::orchestrator::executor::ExecOutcome`].
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure; fatal at startup.
    Config(String),
    /// Caller is not in the allow-list.
    Unauthorized(String),
    /// Requested workspace change is invalid; the workspace is unchanged.
    Workspace(String),
    /// Session file-system operation failure.
    Io(String),
    /// Telegram Bot API or transport failure.
    Telegram(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Workspace(msg) => write!(f, "workspace: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Telegram(msg) => write!(f, "telegram: {msg}"),
        }
    }
}

impl AppError {
    /// Message without the category prefix, suitable for showing to a chat user.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Unauthorized(msg)
            | Self::Workspace(msg)
            | Self::Io(msg)
            | Self::Telegram(msg) => msg,
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL embeds the bot token.
        Self::Telegram(err.without_url().to_string())
    }
}
