//! Supervised execution of external tools with a hard time budget.
//!
//! [`ToolCommand::run`] never returns until the child has exited or been
//! killed and reaped, so no code path leaks a process. The result is a
//! [`ToolOutcome`] that keeps "ran out of time" distinct from "the tool
//! reported an error".

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of trailing stderr lines kept in a failure diagnostic.
const DIAGNOSTIC_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

/// How a supervised tool invocation ended.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// Exit status 0.
    Success(ToolOutput),
    /// The budget elapsed; the child was killed and reaped.
    TimedOut { after: Duration },
    /// Non-zero exit, or the process could not be started or awaited.
    Failed { diagnostic: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Convert into a `Result`, attributing failures to `stage`.
    pub fn into_result(self, stage: &str) -> sc_core::Result<ToolOutput> {
        match self {
            ToolOutcome::Success(output) => Ok(output),
            ToolOutcome::TimedOut { after } => Err(sc_core::Error::timed_out(stage, after)),
            ToolOutcome::Failed { diagnostic } => {
                Err(sc_core::Error::transcode_failed(stage, diagnostic))
            }
        }
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// Arguments are passed as a vector straight to the process; no shell is
/// involved.
///
/// # Example
///
/// ```no_run
/// use sc_av::{ToolCommand, ToolOutcome};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() {
/// let outcome = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .args(["-hide_banner", "-version"])
///     .timeout(Duration::from_secs(5))
///     .run()
///     .await;
/// if let ToolOutcome::Success(out) = outcome {
///     println!("{}", out.stdout);
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command to completion or until the timeout elapses.
    ///
    /// stdout and stderr are drained concurrently with the wait so a tool
    /// that writes more than a pipe buffer cannot stall. The budget covers
    /// both the wait and the drain: a descendant still holding the pipes
    /// when it runs out counts as a timeout. The child leads its own process
    /// group, and on timeout the whole group is killed and the child reaped
    /// before this returns.
    pub async fn run(&self) -> ToolOutcome {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(
            "exec: {} {}",
            self.program.display(),
            self.args
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ToolOutcome::Failed {
                    diagnostic: format!("failed to spawn {program_name}: {e}"),
                }
            }
        };
        let pid = child.id();

        let mut stdout_task = tokio::spawn(drain(child.stdout.take()));
        let mut stderr_task = tokio::spawn(drain(child.stderr.take()));

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                kill_process_group(pid);
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!("Failed to kill {program_name} after wait error: {kill_err}");
                }
                stdout_task.abort();
                stderr_task.abort();
                return ToolOutcome::Failed {
                    diagnostic: format!("I/O error waiting for {program_name}: {e}"),
                };
            }
            Err(_elapsed) => {
                // The group goes first, while the unreaped leader still pins
                // its id. `kill` then reaps the leader.
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed-out {program_name}: {e}");
                }
                stdout_task.abort();
                stderr_task.abort();
                tracing::warn!("{program_name} killed after {:?}", self.timeout);
                return ToolOutcome::TimedOut {
                    after: self.timeout,
                };
            }
        };

        let drained = tokio::time::timeout_at(deadline, async {
            (collect(&mut stdout_task).await, collect(&mut stderr_task).await)
        })
        .await;
        let (stdout, stderr) = match drained {
            Ok(output) => output,
            Err(_elapsed) => {
                // The leader is reaped, but the group id stays reserved while
                // the members holding the pipes are alive.
                kill_process_group(pid);
                stdout_task.abort();
                stderr_task.abort();
                tracing::warn!(
                    "{program_name} exited but its descendants held the output open past {:?}; killed",
                    self.timeout
                );
                return ToolOutcome::TimedOut {
                    after: self.timeout,
                };
            }
        };
        let elapsed = started.elapsed();

        if status.success() {
            ToolOutcome::Success(ToolOutput {
                status,
                stdout,
                stderr,
                elapsed,
            })
        } else {
            ToolOutcome::Failed {
                diagnostic: describe_failure(&program_name, status, &stderr),
            }
        }
    }

    /// Run the command and convert the outcome into a `Result`, attributing
    /// failures to the program name.
    pub async fn execute(&self) -> sc_core::Result<ToolOutput> {
        self.run().await.into_result(&self.program_name())
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative id addresses a group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!("Failed to kill process group {pgid}: {err}");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // A read error just truncates the captured text.
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(task: &mut JoinHandle<String>) -> String {
    task.await.unwrap_or_default()
}

fn describe_failure(program: &str, status: ExitStatus, stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return format!("{program} exited with {status}");
    }
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("/bin/sh"));
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn success_captures_stdout() {
        let outcome = sh("echo hello").run().await;
        match outcome {
            ToolOutcome::Success(out) => {
                assert!(out.status.success());
                assert_eq!(out.stdout.trim(), "hello");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonexistent_tool_is_failed() {
        let outcome = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .run()
            .await;
        match outcome {
            ToolOutcome::Failed { diagnostic } => {
                assert!(diagnostic.contains("failed to spawn"), "{diagnostic}")
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_reports_stderr() {
        let outcome = sh("echo 'Invalid data found when processing input' >&2; exit 1")
            .run()
            .await;
        match outcome {
            ToolOutcome::Failed { diagnostic } => {
                assert_eq!(diagnostic, "Invalid data found when processing input")
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_without_stderr_names_status() {
        let outcome = sh("exit 3").run().await;
        match outcome {
            ToolOutcome::Failed { diagnostic } => {
                assert!(diagnostic.contains("sh exited with"), "{diagnostic}")
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn diagnostic_keeps_the_tail_of_stderr() {
        let outcome = sh("i=0; while [ $i -lt 50 ]; do echo \"line $i\" >&2; i=$((i+1)); done; exit 1")
            .run()
            .await;
        let ToolOutcome::Failed { diagnostic } = outcome else {
            panic!("expected failure");
        };
        let lines: Vec<&str> = diagnostic.lines().collect();
        assert_eq!(lines.len(), DIAGNOSTIC_LINES);
        assert_eq!(lines.last(), Some(&"line 49"));
    }

    #[tokio::test]
    async fn timeout_fires() {
        let started = Instant::now();
        let outcome = sh("sleep 10")
            .timeout(Duration::from_millis(200))
            .run()
            .await;
        assert!(
            matches!(outcome, ToolOutcome::TimedOut { after } if after == Duration::from_millis(200)),
            "unexpected outcome: {outcome:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn timed_out_maps_to_timed_out_error() {
        let err = sh("sleep 10")
            .timeout(Duration::from_millis(100))
            .run()
            .await
            .into_result("composite")
            .unwrap_err();
        assert!(matches!(err, sc_core::Error::TranscodeTimedOut { ref stage, .. } if stage == "composite"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_leaves_no_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());
        let outcome = sh(&script).timeout(Duration::from_millis(300)).run().await;
        assert!(matches!(outcome, ToolOutcome::TimedOut { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_entry = PathBuf::from(format!("/proc/{}", pid.trim()));
        assert!(!proc_entry.exists(), "child {} still present", pid.trim());
    }

    #[tokio::test]
    async fn background_descendant_cannot_stretch_the_budget() {
        let started = Instant::now();
        let outcome = sh("sleep 5 & echo done")
            .timeout(Duration::from_millis(500))
            .run()
            .await;
        assert!(
            matches!(outcome, ToolOutcome::TimedOut { .. }),
            "unexpected outcome: {outcome:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn descendant_with_closed_pipes_does_not_block() {
        let outcome = sh("sleep 5 >/dev/null 2>&1 & echo done")
            .timeout(Duration::from_secs(3))
            .run()
            .await;
        match outcome {
            ToolOutcome::Success(out) => assert_eq!(out.stdout.trim(), "done"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    /// A process counts as gone once it has exited, even if nobody has
    /// reaped the zombie yet.
    #[cfg(target_os = "linux")]
    fn process_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: &str) -> bool {
        for _ in 0..40 {
            if !process_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let outcome = sh(&script).timeout(Duration::from_millis(300)).run().await;
        assert!(matches!(outcome, ToolOutcome::TimedOut { .. }), "{outcome:?}");

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(wait_until_gone(pid.trim()).await, "descendant {} survived", pid.trim());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn descendants_holding_output_are_killed() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("sleep 30 & echo $! > {}", pid_file.display());
        let outcome = sh(&script).timeout(Duration::from_millis(300)).run().await;
        assert!(matches!(outcome, ToolOutcome::TimedOut { .. }), "{outcome:?}");

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(wait_until_gone(pid.trim()).await, "descendant {} survived", pid.trim());
    }

    #[tokio::test]
    async fn large_stderr_does_not_stall() {
        // ~140 KB of stderr, well past a default pipe buffer.
        let outcome = sh(
            "i=0; while [ $i -lt 3000 ]; do echo \"progress line $i padding padding padding\" >&2; i=$((i+1)); done",
        )
        .timeout(Duration::from_secs(20))
        .run()
        .await;
        match outcome {
            ToolOutcome::Success(out) => assert!(out.stderr.len() > 100_000),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn execute_maps_failure_to_error() {
        let err = sh("exit 1").execute().await.unwrap_err();
        assert!(matches!(err, sc_core::Error::TranscodeFailed { .. }));
    }
}
