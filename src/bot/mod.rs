//! Chat-facing command handling.
//!
//! [`Bot`] owns the per-process state (workspaces, session store, agent and
//! shell runners) and turns commands, prompts and button presses into
//! transport-neutral replies. Delivery lives in [`crate::telegram`].

pub mod chunk;
pub mod commands;

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use self::commands::{Command, HELP_TEXT, SHELL_USAGE};
use crate::config::GlobalConfig;
use crate::models::run::{AgentOutput, RunResult};
use crate::models::ChatId;
use crate::orchestrator::agent_runner::{AgentRunner, AgentSettings};
use crate::orchestrator::chat_lock::ChatLocks;
use crate::orchestrator::shell::{render_shell_output, ShellRunner};
use crate::persistence::session_store::{format_file_size, format_session_age, SessionStore};
use crate::workspace::WorkspaceResolver;
use crate::{AppError, Result};

/// Callback data prefix for session buttons.
pub const SESSION_LOAD_PREFIX: &str = "session:load:";

/// Callback data of the cleanup button.
pub const SESSION_CLEANUP: &str = "session:cleanup";

/// One inline button under a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Payload echoed back when pressed.
    pub data: String,
}

/// Reply to a command: text plus optional one-button-per-row keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Message body; may exceed the transport limit and is split on delivery.
    pub text: String,
    /// Buttons, one per row.
    pub keyboard: Vec<Button>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }
}

/// Outcome of a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    /// Short toast shown to the presser.
    pub notice: String,
    /// Replacement text for the message carrying the button.
    pub edit: Option<String>,
}

/// Per-process bot state.
#[derive(Debug)]
pub struct Bot {
    config: Arc<GlobalConfig>,
    workspaces: Arc<WorkspaceResolver>,
    sessions: Arc<SessionStore>,
    agent: AgentRunner,
    shell: ShellRunner,
}

impl Bot {
    /// Wire up all components from the effective configuration.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>) -> Self {
        let workspaces = Arc::new(
            WorkspaceResolver::new(config.workspace_root.clone(), config.home_dir.clone())
                .with_allowed_roots(config.allowed_workspace_roots.clone()),
        );
        let sessions = Arc::new(SessionStore::new(config.session_dir.clone()));
        let agent = AgentRunner::new(
            AgentSettings::from_config(&config),
            ChatLocks::new(),
            Arc::clone(&sessions),
            Arc::clone(&workspaces),
        );

        Self {
            config,
            workspaces,
            sessions,
            agent,
            shell: ShellRunner::default(),
        }
    }

    /// Replace the shell runner.
    #[must_use]
    pub fn with_shell(mut self, shell: ShellRunner) -> Self {
        self.shell = shell;
        self
    }

    /// Create the default workspace and the session directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` or `AppError::Io` if either directory
    /// cannot be created.
    pub async fn prepare(&self) -> Result<()> {
        self.workspaces.ensure_default_root().await?;
        self.sessions.ensure_root().await
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Agent runner.
    #[must_use]
    pub fn agent(&self) -> &AgentRunner {
        &self.agent
    }

    /// Session store.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Workspace resolver.
    #[must_use]
    pub fn workspaces(&self) -> &WorkspaceResolver {
        &self.workspaces
    }

    /// Check the sender against the allow-list. A message without a sender
    /// only passes when no allow-list is configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` when the sender may not use the bot.
    pub fn ensure_authorized(&self, user_id: Option<i64>) -> Result<()> {
        match user_id {
            Some(id) => self.config.ensure_authorized(id),
            None if self.config.allowed_users.is_empty() => Ok(()),
            None => Err(AppError::Unauthorized(
                "Sorry, you are not authorized to use this bot.".into(),
            )),
        }
    }

    /// Forward free text to the agent for `chat_id`.
    pub async fn handle_prompt(&self, chat_id: ChatId, prompt: &str) -> RunResult {
        self.agent.run(chat_id, prompt).await
    }

    /// Execute a command. `None` for commands the bot does not know.
    pub async fn handle_command(&self, chat_id: ChatId, command: Command) -> Option<Reply> {
        let reply = match command {
            Command::Start => self.start(chat_id).await,
            Command::Help => Reply::text(HELP_TEXT),
            Command::Pwd => {
                let cwd = self.workspaces.current(chat_id).await;
                Reply::text(format!("\u{1f4c1} {}", self.workspaces.display(&cwd)))
            }
            Command::Cd(target) => {
                let moved = match target {
                    Some(path) => self.workspaces.change(chat_id, &path).await,
                    None => self.workspaces.go_home(chat_id).await,
                };
                self.workspace_reply(moved)
            }
            Command::Home => {
                let moved = self.workspaces.go_home(chat_id).await;
                self.workspace_reply(moved)
            }
            Command::Shell(line) => self.shell(chat_id, &line).await,
            Command::Session => self.list_sessions().await,
            Command::New => self.new_session(chat_id).await,
            Command::Status => Reply::text(self.status(chat_id).await),
            Command::Unknown(_) => return None,
        };
        Some(reply)
    }

    /// React to an inline button press. `None` for unrecognised payloads.
    pub async fn handle_callback(&self, data: &str) -> Option<CallbackReply> {
        if data == SESSION_CLEANUP {
            let retain = self.config.sessions.retention_per_chat;
            let edit = match self.sessions.cleanup(retain).await {
                Ok(deleted) => format!(
                    "\u{1f5d1} Cleanup complete!\nDeleted {deleted} old session(s).\nKept the {retain} most recent sessions per chat."
                ),
                Err(err) => format!("Error: {}", err.user_message()),
            };
            return Some(CallbackReply {
                notice: "Cleaning up...".into(),
                edit: Some(edit),
            });
        }

        let filename = data.strip_prefix(SESSION_LOAD_PREFIX)?;
        Some(CallbackReply {
            notice: format!("Selected: {filename}"),
            edit: Some(format!(
                "Selected session: {filename}\n\n(Session switching is not supported yet)"
            )),
        })
    }

    async fn start(&self, chat_id: ChatId) -> Reply {
        let available = self.agent.check_available().await;
        let cwd = self.workspaces.current(chat_id).await;
        let agent_line = if available {
            "\u{2705} Agent: Ready".to_owned()
        } else {
            format!(
                "\u{26a0}\u{fe0f} Agent: Not installed or not authenticated ({})",
                self.config.agent.program
            )
        };

        Reply::text(format!(
            "\u{1f916} Welcome to Mini-Claw!\n\n{agent_line}\n\u{1f4c1} Working directory: {}\n\n\
             Send any message to chat with the AI agent.\nType /help to see all commands.",
            self.workspaces.display(&cwd)
        ))
    }

    fn workspace_reply(&self, moved: Result<std::path::PathBuf>) -> Reply {
        match moved {
            Ok(path) => Reply::text(format!("\u{1f4c1} {}", self.workspaces.display(&path))),
            Err(err) => Reply::text(format!("Error: {}", err.user_message())),
        }
    }

    async fn shell(&self, chat_id: ChatId, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::text(SHELL_USAGE);
        }
        let cwd = self.workspaces.current(chat_id).await;
        let output = self.shell.run(line, &cwd).await;
        Reply::text(render_shell_output(&output))
    }

    async fn list_sessions(&self) -> Reply {
        let files = match self.sessions.list_recent().await {
            Ok(files) => files,
            Err(err) => return Reply::text(format!("Error: {}", err.user_message())),
        };
        if files.is_empty() {
            return Reply::text("No sessions found.");
        }

        let now = Utc::now();
        let mut keyboard = Vec::new();
        for file in files.iter().take(self.config.sessions.listing_limit) {
            let title = self.sessions.title_for(&file.path).await;
            keyboard.push(Button {
                label: format!(
                    "{title} ({}, {})",
                    format_session_age(file.modified_at, now),
                    format_file_size(file.size_bytes)
                ),
                data: format!("{SESSION_LOAD_PREFIX}{}", file.filename),
            });
        }
        keyboard.push(Button {
            label: "\u{1f5d1} Clean Up Old Sessions".into(),
            data: SESSION_CLEANUP.into(),
        });

        Reply {
            text: format!(
                "\u{1f4da} Sessions ({} total)\n\nTap a session to select it:",
                files.len()
            ),
            keyboard,
        }
    }

    async fn new_session(&self, chat_id: ChatId) -> Reply {
        // Never rename a log out from under a running agent.
        let guard = self.agent.locks().acquire(chat_id).await;
        let archived = self.sessions.archive(chat_id).await;
        guard.release();

        match archived {
            Ok(Some(name)) => {
                info!(chat_id, archived = %name, "session archived");
                Reply::text(format!(
                    "Session archived as {name}\nStarting fresh conversation."
                ))
            }
            Ok(None) => Reply::text("Starting fresh conversation."),
            Err(err) => {
                warn!(chat_id, %err, "session archive failed");
                Reply::text(format!("Error: {}", err.user_message()))
            }
        }
    }

    async fn status(&self, chat_id: ChatId) -> String {
        let available = self.agent.check_available().await;
        let cwd = self.workspaces.current(chat_id).await;
        let busy = self.agent.locks().is_in_flight(chat_id);

        format!(
            "\u{1f4ca} Status\n\n\
             Agent: {}\n\
             Chat ID: {chat_id}\n\
             Workspace: {}\n\
             Thinking: {}\n\
             Agent run in progress: {}",
            if available { "OK" } else { "Not available" },
            self.workspaces.display(&cwd),
            self.config.thinking_level,
            if busy { "yes" } else { "no" },
        )
    }
}

/// Messages reporting an agent turn: the error line (if any), then the
/// agent's output. A successful turn with no output reports `(no output)`.
#[must_use]
pub fn render_run_result(result: &RunResult) -> Vec<String> {
    let mut messages = Vec::new();
    if let Some(error) = &result.error {
        messages.push(format!("Error: {error}"));
    }

    let text = match &result.output {
        AgentOutput::Text(text) => text.trim(),
        AgentOutput::Empty => "",
    };
    if !text.is_empty() {
        messages.push(text.to_owned());
    } else if result.is_success() {
        messages.push(AgentOutput::Empty.to_string());
    }
    messages
}
