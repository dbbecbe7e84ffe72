//! Agent invocation orchestrator.
//!
//! Runs one agent turn for a chat: wait for the chat lock, resolve the
//! chat's workspace and session log, run the agent CLI under the executor,
//! and translate the raw process result into a [`RunResult`].
//!
//! The agent is invoked as
//! `<program> --session <log> --print --thinking <level> <prompt>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};

use super::chat_lock::ChatLocks;
use super::executor::{self, ExecOutcome, ExecOutput, ExecRequest};
use crate::config::{GlobalConfig, ThinkingLevel};
use crate::models::run::{AgentOutput, RunResult, RunState};
use crate::models::ChatId;
use crate::persistence::session_store::SessionStore;
use crate::workspace::WorkspaceResolver;

/// Environment variable pointing the agent at its auth/state directory.
pub const AGENT_DIR_ENV: &str = "PI_AGENT_DIR";

/// Budget for the `--version` liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// How the agent CLI is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Agent binary.
    pub program: String,
    /// Exported as [`AGENT_DIR_ENV`].
    pub agent_dir: PathBuf,
    /// Passed as `--thinking`.
    pub thinking_level: ThinkingLevel,
    /// Wall-clock budget per turn.
    pub timeout: Duration,
}

impl AgentSettings {
    /// Settings taken from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            program: config.agent.program.clone(),
            agent_dir: config.agent.agent_dir.clone(),
            thinking_level: config.thinking_level,
            timeout: config.agent_timeout(),
        }
    }
}

/// Composes the chat lock, workspace resolver, session store and executor.
#[derive(Debug)]
pub struct AgentRunner {
    settings: AgentSettings,
    locks: ChatLocks,
    sessions: Arc<SessionStore>,
    workspaces: Arc<WorkspaceResolver>,
}

impl AgentRunner {
    /// Build a runner. `locks` is shared with anything else that must not
    /// overlap an agent turn for the same chat (for example archival).
    #[must_use]
    pub fn new(
        settings: AgentSettings,
        locks: ChatLocks,
        sessions: Arc<SessionStore>,
        workspaces: Arc<WorkspaceResolver>,
    ) -> Self {
        Self {
            settings,
            locks,
            sessions,
            workspaces,
        }
    }

    /// Chat lock registry used by this runner.
    #[must_use]
    pub fn locks(&self) -> &ChatLocks {
        &self.locks
    }

    /// Invocation settings.
    #[must_use]
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run one agent turn for `chat_id`.
    ///
    /// Waits behind any in-flight turn of the same chat. Never fails: setup
    /// problems, spawn errors, non-zero exits and timeouts all come back as
    /// a [`RunResult`], and the chat lock is released on every path.
    pub async fn run(&self, chat_id: ChatId, prompt: &str) -> RunResult {
        let span = info_span!("agent_run", chat_id, prompt_len = prompt.len());
        async {
            debug!("waiting for chat lock");
            let guard = self.locks.acquire(chat_id).await;
            debug!("chat lock acquired, running agent");

            let result = self.run_locked(chat_id, prompt).await;
            guard.release();

            match result.state {
                RunState::Success => info!(exit_code = ?result.exit_code, "agent run succeeded"),
                RunState::Failure => warn!(
                    exit_code = ?result.exit_code,
                    error = result.error.as_deref().unwrap_or_default(),
                    "agent run failed"
                ),
                RunState::Timeout => warn!("agent run timed out"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Build the executor request for one turn.
    #[must_use]
    pub fn request_for(&self, chat_id: ChatId, prompt: &str, workspace: PathBuf) -> ExecRequest {
        let session_path = self.sessions.path_for(chat_id);
        ExecRequest::new(&self.settings.program, workspace, self.settings.timeout)
            .arg("--session")
            .arg(session_path.to_string_lossy())
            .arg("--print")
            .args(["--thinking", self.settings.thinking_level.as_str()])
            .arg(prompt)
            .env(AGENT_DIR_ENV, self.settings.agent_dir.to_string_lossy())
    }

    /// Whether the agent CLI is installed and answers `--version`.
    pub async fn check_available(&self) -> bool {
        let cwd = self.workspaces.default_root().to_path_buf();
        let cwd = if cwd.is_dir() { cwd } else { std::env::temp_dir() };
        let request = ExecRequest::new(&self.settings.program, cwd, PROBE_TIMEOUT).arg("--version");
        let output = executor::run(&request).await;
        debug!(ok = output.success(), "agent liveness probe");
        output.success()
    }

    async fn run_locked(&self, chat_id: ChatId, prompt: &str) -> RunResult {
        if let Err(err) = self.sessions.ensure_root().await {
            return RunResult::setup_failure(format!(
                "Failed to prepare session directory: {}",
                err.user_message()
            ));
        }

        let workspace = self.workspaces.current(chat_id).await;
        let request = self.request_for(chat_id, prompt, workspace);
        let output = executor::run(&request).await;
        interpret(output, self.settings.timeout)
    }
}

/// Translate a raw execution into the user-facing result of an agent turn.
#[must_use]
pub fn interpret(output: ExecOutput, timeout: Duration) -> RunResult {
    let ExecOutput {
        stdout,
        stderr,
        exit_code,
        outcome,
    } = output;

    match outcome {
        ExecOutcome::StartFailed => RunResult {
            state: RunState::Failure,
            output: AgentOutput::Empty,
            error: Some(format!("Failed to start agent: {}", stderr.trim())),
            exit_code: Some(exit_code),
        },
        ExecOutcome::TimedOut => RunResult {
            state: RunState::Timeout,
            output: AgentOutput::from_stdout(stdout),
            error: Some(format!(
                "Timeout: agent took longer than {}s",
                timeout.as_secs_f64()
            )),
            exit_code: Some(exit_code),
        },
        ExecOutcome::Exited if exit_code == 0 => RunResult {
            state: RunState::Success,
            output: AgentOutput::from_stdout(stdout),
            error: None,
            exit_code: Some(0),
        },
        ExecOutcome::Exited => {
            let detail = stderr.trim();
            let error = if detail.is_empty() {
                format!("agent exited with code {exit_code}")
            } else {
                format!("{detail}\n[exit code: {exit_code}]")
            };
            RunResult {
                state: RunState::Failure,
                output: AgentOutput::from_stdout(stdout),
                error: Some(error),
                exit_code: Some(exit_code),
            }
        }
    }
}
