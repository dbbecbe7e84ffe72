//! Global configuration parsing, validation, and credential loading.
//!
//! Values come from three layers, later layers winning: built-in defaults,
//! an optional TOML file, and environment variables. The bot token is never
//! read from the TOML file; it is loaded from the OS keychain with an
//! environment-variable fallback.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::workspace::path_safety::expand_home;
use crate::{AppError, Result};

/// Keychain service under which the bot token may be stored.
const KEYCHAIN_SERVICE: &str = "mini-claw";

/// Keychain entry name for the bot token.
const KEYCHAIN_TOKEN_KEY: &str = "telegram_bot_token";

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// How much reasoning the agent spends per turn.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingLevel {
    /// Fast, shallow reasoning.
    #[default]
    Low,
    /// Balanced reasoning.
    Medium,
    /// Slow, thorough reasoning.
    High,
}

impl ThinkingLevel {
    /// Value passed to the agent's `--thinking` flag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Display for ThinkingLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThinkingLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(AppError::Config(format!(
                "thinking level must be low, medium or high, got {other:?}"
            ))),
        }
    }
}

/// Telegram Bot API connectivity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TelegramConfig {
    /// Bot token (populated at runtime, never from TOML).
    #[serde(skip)]
    pub bot_token: String,
    /// Base URL of the Bot API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout() -> u64 {
    30
}

/// Agent CLI invocation settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Agent binary, resolved through `PATH`.
    #[serde(default = "default_agent_program")]
    pub program: String,
    /// Agent state/auth directory exported as `PI_AGENT_DIR`.
    #[serde(default)]
    pub agent_dir: PathBuf,
    /// Wall-clock budget for one agent turn.
    #[serde(default = "default_agent_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            agent_dir: PathBuf::new(),
            timeout_seconds: default_agent_timeout(),
        }
    }
}

fn default_agent_program() -> String {
    "pi".into()
}

fn default_agent_timeout() -> u64 {
    300
}

/// Session listing and retention settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Session files kept per chat by cleanup.
    #[serde(default = "default_retention_per_chat")]
    pub retention_per_chat: usize,
    /// Sessions shown by `/session`.
    #[serde(default = "default_listing_limit")]
    pub listing_limit: usize,
    /// Period of the background cleanup; 0 disables it.
    #[serde(default)]
    pub cleanup_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retention_per_chat: default_retention_per_chat(),
            listing_limit: default_listing_limit(),
            cleanup_interval_seconds: 0,
        }
    }
}

fn default_retention_per_chat() -> usize {
    5
}

fn default_listing_limit() -> usize {
    10
}

/// Global configuration parsed from `config.toml` and the environment.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Telegram connectivity settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Default workspace for every chat.
    #[serde(default)]
    pub workspace_root: PathBuf,
    /// Directory holding session logs.
    #[serde(default)]
    pub session_dir: PathBuf,
    /// Roots a chat may `/cd` into; empty means anywhere.
    #[serde(default)]
    pub allowed_workspace_roots: Vec<PathBuf>,
    /// Agent reasoning effort.
    #[serde(default)]
    pub thinking_level: ThinkingLevel,
    /// Telegram user ids allowed to use the bot; empty means everyone.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    /// Agent invocation settings.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Session retention settings.
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Home directory used for `~` expansion (populated at runtime).
    #[serde(skip)]
    pub home_dir: PathBuf,
}

impl GlobalConfig {
    /// Build the effective configuration: optional TOML file, then
    /// environment overrides, then path resolution and validation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or validation fails.
    pub fn load(
        path: Option<&Path>,
        home_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(env)?;
        config.resolve_paths(home_dir);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string. Paths are left unresolved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `MINI_CLAW_*`, `PI_THINKING_LEVEL` and `ALLOWED_USERS` overrides.
    ///
    /// Blank variables are ignored. Non-numeric entries in `ALLOWED_USERS`
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unknown thinking level or a
    /// malformed timeout.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| {
            env(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        if let Some(workspace) = var("MINI_CLAW_WORKSPACE") {
            self.workspace_root = PathBuf::from(workspace);
        }
        if let Some(session_dir) = var("MINI_CLAW_SESSION_DIR") {
            self.session_dir = PathBuf::from(session_dir);
        }
        if let Some(level) = var("PI_THINKING_LEVEL") {
            self.thinking_level = level.parse()?;
        }
        if let Some(timeout) = var("MINI_CLAW_AGENT_TIMEOUT") {
            self.agent.timeout_seconds = timeout.parse().map_err(|err| {
                AppError::Config(format!("MINI_CLAW_AGENT_TIMEOUT must be seconds: {err}"))
            })?;
        }
        if let Some(users) = var("ALLOWED_USERS") {
            self.allowed_users = parse_user_ids(&users);
        }
        Ok(())
    }

    /// Fill unset paths with defaults under `home_dir` and expand `~`.
    pub fn resolve_paths(&mut self, home_dir: &Path) {
        home_dir.clone_into(&mut self.home_dir);

        if self.workspace_root.as_os_str().is_empty() {
            self.workspace_root = home_dir.join("mini-claw-workspace");
        }
        if self.session_dir.as_os_str().is_empty() {
            self.session_dir = home_dir.join(".mini-claw").join("sessions");
        }
        if self.agent.agent_dir.as_os_str().is_empty() {
            self.agent.agent_dir = home_dir.join(".pi").join("agent");
        }

        self.workspace_root = expand_home(&self.workspace_root, home_dir);
        self.session_dir = expand_home(&self.session_dir, home_dir);
        self.agent.agent_dir = expand_home(&self.agent.agent_dir, home_dir);
        self.allowed_workspace_roots = self
            .allowed_workspace_roots
            .iter()
            .map(|root| expand_home(root, home_dir))
            .collect();
    }

    /// Load the bot token from the OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither source provides a token.
    pub async fn load_credentials(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let keychain = keychain_token().await;
        self.telegram.bot_token = resolve_token(keychain, env)?;
        Ok(())
    }

    /// Validate that a Telegram user may use the bot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` if an allow-list is configured and
    /// the user is not on it.
    pub fn ensure_authorized(&self, user_id: i64) -> Result<()> {
        if self.allowed_users.is_empty() || self.allowed_users.contains(&user_id) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "Sorry, you are not authorized to use this bot.".into(),
            ))
        }
    }

    /// Wall-clock budget for one agent turn.
    #[must_use]
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.agent.program.trim().is_empty() {
            return Err(AppError::Config("agent.program must not be empty".into()));
        }
        if self.agent.timeout_seconds == 0 {
            return Err(AppError::Config(
                "agent.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.sessions.retention_per_chat == 0 {
            return Err(AppError::Config(
                "sessions.retention_per_chat must be at least 1".into(),
            ));
        }
        if self.sessions.listing_limit == 0 {
            return Err(AppError::Config(
                "sessions.listing_limit must be at least 1".into(),
            ));
        }
        if !self.workspace_root.is_absolute() || !self.session_dir.is_absolute() {
            return Err(AppError::Config(
                "workspace_root and session_dir must be absolute paths".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of user ids, skipping malformed entries.
#[must_use]
pub fn parse_user_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(entry = part, "ignoring malformed ALLOWED_USERS entry");
                None
            }
        })
        .collect()
}

/// Pick the bot token: a non-empty keychain value wins, then `TELEGRAM_BOT_TOKEN`.
///
/// # Errors
///
/// Returns `AppError::Config` naming both sources when neither has a token.
pub fn resolve_token(
    keychain: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    if let Some(token) = keychain.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_owned());
    }

    env(TOKEN_ENV)
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::Config(format!(
                "{TOKEN_ENV} is required: not found in keychain service \
                 {KEYCHAIN_SERVICE} or the environment"
            ))
        })
}

/// Read the bot token from the OS keychain, if present.
async fn keychain_token() -> Option<String> {
    // keyring is synchronous I/O.
    let lookup = tokio::task::spawn_blocking(|| {
        keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_TOKEN_KEY)
            .and_then(|entry| entry.get_password())
    })
    .await;

    match lookup {
        Ok(Ok(value)) if !value.is_empty() => Some(value),
        Ok(Ok(_)) => {
            warn!(key = KEYCHAIN_TOKEN_KEY, "keychain entry is empty, trying env var");
            None
        }
        Ok(Err(err)) => {
            tracing::debug!(key = KEYCHAIN_TOKEN_KEY, ?err, "keychain lookup failed, trying env var");
            None
        }
        Err(err) => {
            warn!(%err, "keychain task panicked, trying env var");
            None
        }
    }
}
