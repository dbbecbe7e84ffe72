use std::time::Duration;

use mini_claw::bot::render_run_result;
use mini_claw::models::run::{AgentOutput, RunResult, RunState};
use mini_claw::orchestrator::agent_runner::interpret;
use mini_claw::orchestrator::executor::{ExecOutcome, ExecOutput};

fn exec(stdout: &str, stderr: &str, exit_code: i32, outcome: ExecOutcome) -> ExecOutput {
    ExecOutput {
        stdout: stdout.into(),
        stderr: stderr.into(),
        exit_code,
        outcome,
    }
}

const TIMEOUT: Duration = Duration::from_secs(300);

#[test]
fn zero_exit_is_success() {
    let result = interpret(exec("answer\n", "", 0, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(result.state, RunState::Success);
    assert_eq!(result.output, AgentOutput::Text("answer\n".into()));
    assert_eq!(result.error, None);
    assert!(result.is_success());
}

#[test]
fn empty_stdout_is_distinct_from_whitespace() {
    let empty = interpret(exec("", "", 0, ExecOutcome::Exited), TIMEOUT);
    assert!(empty.output.is_empty());

    let blank = interpret(exec("  \n", "", 0, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(blank.output.as_text(), Some("  \n"));
}

#[test]
fn non_zero_exit_reports_stderr_and_code() {
    let result = interpret(exec("", "boom\n", 2, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(result.state, RunState::Failure);
    assert_eq!(result.error.as_deref(), Some("boom\n[exit code: 2]"));
    assert_eq!(result.exit_code, Some(2));
}

#[test]
fn non_zero_exit_without_stderr_is_still_a_failure() {
    let result = interpret(exec("partial", "", 1, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(result.state, RunState::Failure);
    assert_eq!(result.error.as_deref(), Some("agent exited with code 1"));
    assert_eq!(result.output.as_text(), Some("partial"));
}

#[test]
fn timeout_names_the_budget() {
    let result = interpret(
        exec("", "\n(timeout)", 124, ExecOutcome::TimedOut),
        Duration::from_millis(1500),
    );
    assert_eq!(result.state, RunState::Timeout);
    assert_eq!(
        result.error.as_deref(),
        Some("Timeout: agent took longer than 1.5s")
    );
}

#[test]
fn start_failure_is_reported() {
    let result = interpret(
        exec("", "No such file or directory (os error 2)", 127, ExecOutcome::StartFailed),
        TIMEOUT,
    );
    assert_eq!(result.state, RunState::Failure);
    assert!(result
        .error
        .as_deref()
        .expect("error")
        .starts_with("Failed to start agent:"));
}

#[test]
fn rendering_success_shows_trimmed_output() {
    let result = interpret(exec("\n  hi  \n", "", 0, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(render_run_result(&result), vec!["hi".to_owned()]);
}

#[test]
fn rendering_empty_success_says_no_output() {
    let result = interpret(exec(" \n", "", 0, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(render_run_result(&result), vec!["(no output)".to_owned()]);
}

#[test]
fn rendering_failure_leads_with_error() {
    let result = interpret(exec("partial", "bad", 1, ExecOutcome::Exited), TIMEOUT);
    assert_eq!(
        render_run_result(&result),
        vec!["Error: bad\n[exit code: 1]".to_owned(), "partial".to_owned()]
    );

    let setup = RunResult::setup_failure("no disk");
    assert_eq!(render_run_result(&setup), vec!["Error: no disk".to_owned()]);
}
