//! Direct shell execution for `/shell`.
//!
//! Shell commands bypass the chat lock: they are short, bounded by a fixed
//! timeout, and do not touch the session log.

use std::path::Path;
use std::time::Duration;

use tracing::{info, info_span, Instrument};

use super::executor::{self, ExecOutput, ExecRequest};

/// Fixed budget for one shell command.
pub const SHELL_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs commands through `<shell> -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRunner {
    program: String,
    timeout: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl ShellRunner {
    /// Runner using `program` as the shell.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: SHELL_TIMEOUT,
        }
    }

    /// Override the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `command` in `cwd`.
    pub async fn run(&self, command: &str, cwd: &Path) -> ExecOutput {
        let span = info_span!("shell", cwd = %cwd.display(), command_len = command.len());
        async {
            let request = ExecRequest::new(&self.program, cwd, self.timeout)
                .arg("-c")
                .arg(command);
            let output = executor::run(&request).await;
            info!(exit_code = output.exit_code, outcome = ?output.outcome, "shell command finished");
            output
        }
        .instrument(span)
        .await
    }
}

/// Render a shell result for a chat reply: stdout, then `stderr: ...`,
/// `(no output)` when both are empty, and the exit code when non-zero.
#[must_use]
pub fn render_shell_output(output: &ExecOutput) -> String {
    let mut text = String::new();
    if !output.stdout.is_empty() {
        text.push_str(&output.stdout);
    }
    if !output.stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("stderr: ");
        text.push_str(&output.stderr);
    }
    if text.is_empty() {
        text.push_str("(no output)");
    }
    if output.exit_code != 0 {
        text.push_str(&format!("\n\n[exit code: {}]", output.exit_code));
    }
    text.trim().to_owned()
}
