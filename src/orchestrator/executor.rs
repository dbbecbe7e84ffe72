//! Subprocess executor with incremental capture and a hard timeout.
//!
//! One call spawns one process and arms one timer. Completion is a race
//! between process exit and the timer inside a single `select!`:
//!
//! - exit first: the timer is dropped, pipes are drained briefly, and the
//!   real exit code is reported;
//! - timer first: the child gets SIGTERM, whatever was buffered is returned
//!   immediately, and the child handle moves to a detached reaper that
//!   escalates to SIGKILL after [`KILL_GRACE`];
//! - spawn error: no timer is armed at all.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, warn, Instrument};

/// Exit code reported when the timeout fired.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the program could not be started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Appended to stderr when the timeout fired.
pub const TIMEOUT_MARKER: &str = "\n(timeout)";

/// Time a signalled child gets to exit before it is killed.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Time allowed for the pipes to reach EOF after a normal exit.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// What to run, where, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Program name or path.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Wall-clock budget.
    pub timeout: Duration,
}

impl ExecRequest {
    /// Request to run `program` in `cwd` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            timeout,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The process ran and exited on its own (any exit code).
    Exited,
    /// The process could not be spawned.
    StartFailed,
    /// The timeout fired first.
    TimedOut,
}

/// Captured result of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded, plus diagnostics on failure.
    pub stderr: String,
    /// Exit code, [`TIMEOUT_EXIT_CODE`] or [`SPAWN_FAILURE_EXIT_CODE`].
    pub exit_code: i32,
    /// How the execution ended.
    pub outcome: ExecOutcome,
}

impl ExecOutput {
    fn start_failed(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: message,
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            outcome: ExecOutcome::StartFailed,
        }
    }

    /// Whether the process exited on its own with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcome == ExecOutcome::Exited && self.exit_code == 0
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Run `request` to completion, failure, or timeout. Never returns an
/// error: every failure mode is encoded in the [`ExecOutput`].
pub async fn run(request: &ExecRequest) -> ExecOutput {
    let span = debug_span!(
        "exec",
        program = %request.program,
        cwd = %request.cwd.display(),
        timeout_ms = u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
    );
    run_inner(request).instrument(span).await
}

async fn run_inner(request: &ExecRequest) -> ExecOutput {
    let mut command = Command::new(&request.program);
    command
        .args(&request.args)
        .current_dir(&request.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &request.env {
        command.env(key, value);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(%err, "failed to spawn process");
            return ExecOutput::start_failed(err.to_string());
        }
    };
    debug!(pid = child.id().unwrap_or(0), "process spawned");

    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let mut readers = Readers(
        [
            spawn_reader(child.stdout.take(), Arc::clone(&stdout)),
            spawn_reader(child.stderr.take(), Arc::clone(&stderr)),
        ]
        .into_iter()
        .flatten()
        .collect(),
    );

    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = tokio::time::sleep(request.timeout) => None,
    };

    match exited {
        Some(Ok(status)) => {
            readers.drain(DRAIN_GRACE).await;
            let exit_code = exit_code_of(status);
            debug!(exit_code, "process exited");
            ExecOutput {
                stdout: take_text(&stdout),
                stderr: take_text(&stderr),
                exit_code,
                outcome: ExecOutcome::Exited,
            }
        }
        Some(Err(err)) => {
            warn!(%err, "failed to wait for process");
            terminate(&mut child);
            spawn_reaper(child);
            let mut stderr = take_text(&stderr);
            stderr.push_str(&format!("\n(wait failed: {err})"));
            ExecOutput {
                stdout: take_text(&stdout),
                stderr,
                exit_code: -1,
                outcome: ExecOutcome::Exited,
            }
        }
        None => {
            warn!("process timed out, sending termination signal");
            terminate(&mut child);
            spawn_reaper(child);
            let mut stderr = take_text(&stderr);
            stderr.push_str(TIMEOUT_MARKER);
            ExecOutput {
                stdout: take_text(&stdout),
                stderr,
                exit_code: TIMEOUT_EXIT_CODE,
                outcome: ExecOutcome::TimedOut,
            }
        }
    }
}

/// Pipe reader tasks; aborted when dropped.
struct Readers(Vec<JoinHandle<()>>);

impl Readers {
    async fn drain(&mut self, grace: Duration) {
        let all = join_readers(&mut self.0);
        if tokio::time::timeout(grace, all).await.is_err() {
            debug!("output pipes still open after exit, abandoning readers");
        }
    }
}

impl Drop for Readers {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

async fn join_readers(tasks: &mut [JoinHandle<()>]) {
    for task in tasks {
        // A reader only ends by EOF, read error, or abort.
        let _ = task.await;
    }
}

fn spawn_reader<R>(source: Option<R>, buffer: SharedBuffer) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut source = source?;
    Some(tokio::spawn(async move {
        let mut chunk = vec![0_u8; READ_CHUNK];
        loop {
            match source.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
            }
        }
    }))
}

fn take_text(buffer: &SharedBuffer) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Ask the child to stop. Best effort: the child may ignore it.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, %err, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!(%err, "failed to kill process");
    }
}

/// Reap a signalled child in the background, killing it if it lingers.
fn spawn_reaper(mut child: Child) {
    tokio::spawn(async move {
        let pid = child.id().unwrap_or(0);
        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(pid, ?status, "timed-out process reaped"),
            Ok(Err(err)) => warn!(pid, %err, "error waiting for timed-out process"),
            Err(_) => {
                warn!(pid, "process ignored termination signal, killing");
                if let Err(err) = child.kill().await {
                    warn!(pid, %err, "failed to kill process");
                }
            }
        }
    });
}
