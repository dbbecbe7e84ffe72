//! Result of one agent turn.

use std::fmt::{Display, Formatter};

/// Terminal state of an agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Agent exited with status 0.
    Success,
    /// Agent could not start, or exited non-zero.
    Failure,
    /// Agent exceeded its wall-clock budget and was signalled.
    Timeout,
}

/// Text the agent printed on stdout.
///
/// `Empty` is kept apart from `Text` so that a run producing nothing can be
/// told from one producing only whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    /// Nothing was printed.
    Empty,
    /// Raw stdout, possibly whitespace-only.
    Text(String),
}

impl AgentOutput {
    /// Wrap captured stdout.
    #[must_use]
    pub fn from_stdout(stdout: String) -> Self {
        if stdout.is_empty() {
            Self::Empty
        } else {
            Self::Text(stdout)
        }
    }

    /// Whether the agent printed nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Captured text, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Text(text) => Some(text),
        }
    }
}

impl Display for AgentOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("(no output)"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Outcome of [`crate::orchestrator::agent_runner::AgentRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Terminal state.
    pub state: RunState,
    /// Whatever the agent printed, partial on timeout.
    pub output: AgentOutput,
    /// User-facing error message; `None` exactly when `state` is `Success`.
    pub error: Option<String>,
    /// Process exit code, or the executor's sentinel.
    pub exit_code: Option<i32>,
}

impl RunResult {
    /// A failure that happened before the agent could be spawned.
    #[must_use]
    pub fn setup_failure(message: impl Into<String>) -> Self {
        Self {
            state: RunState::Failure,
            output: AgentOutput::Empty,
            error: Some(message.into()),
            exit_code: None,
        }
    }

    /// Whether the run ended in [`RunState::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Success
    }
}
