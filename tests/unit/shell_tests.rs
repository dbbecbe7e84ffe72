use std::time::Duration;

use mini_claw::orchestrator::executor::{ExecOutcome, ExecOutput};
use mini_claw::orchestrator::shell::{render_shell_output, ShellRunner};

fn exec(stdout: &str, stderr: &str, exit_code: i32) -> ExecOutput {
    ExecOutput {
        stdout: stdout.into(),
        stderr: stderr.into(),
        exit_code,
        outcome: ExecOutcome::Exited,
    }
}

#[test]
fn stdout_only() {
    assert_eq!(render_shell_output(&exec("file.txt\n", "", 0)), "file.txt");
}

#[test]
fn stderr_follows_stdout() {
    assert_eq!(
        render_shell_output(&exec("out\n", "warn\n", 0)),
        "out\n\nstderr: warn"
    );
}

#[test]
fn silent_failure_shows_placeholder_and_code() {
    assert_eq!(
        render_shell_output(&exec("", "", 3)),
        "(no output)\n\n[exit code: 3]"
    );
}

#[test]
fn timeout_output_carries_marker_and_code() {
    let output = ExecOutput {
        stdout: String::new(),
        stderr: "\n(timeout)".into(),
        exit_code: 124,
        outcome: ExecOutcome::TimedOut,
    };
    assert_eq!(
        render_shell_output(&output),
        "stderr: \n(timeout)\n\n[exit code: 124]"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn runs_command_in_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("marker.txt"), "").expect("write");

    let output = ShellRunner::new("sh").run("ls", temp.path()).await;

    assert!(output.success());
    assert_eq!(render_shell_output(&output), "marker.txt");
}

#[cfg(unix)]
#[tokio::test]
async fn shell_timeout_is_enforced() {
    let temp = tempfile::tempdir().expect("tempdir");
    let shell = ShellRunner::new("sh").with_timeout(Duration::from_millis(100));

    let output = shell.run("sleep 10", temp.path()).await;

    assert_eq!(output.outcome, ExecOutcome::TimedOut);
}
