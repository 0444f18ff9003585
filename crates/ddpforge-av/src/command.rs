//! Builder for executing the external decoder and encoder.
//!
//! Two execution modes are offered:
//!
//! - [`ToolCommand::execute`] captures stdout and stderr whole; used for short
//!   inspection calls.
//! - [`ToolCommand::stream`] consumes stdout and stderr as one line stream
//!   while the process runs, keeping only a bounded diagnostic tail.
//!   [`ToolCommand::run_with_progress`] layers progress parsing on top.
//!
//! A non-zero exit from a streamed run is reported through [`RunOutcome`],
//! not as an error; the caller decides how fatal it is.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::progress::{ProgressEvent, ProgressMonitor};
use crate::shim::ValidatorShim;
use crate::{Error, Result};

/// Number of trailing output lines retained for diagnostics.
pub const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Output captured from a short tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Result of a streamed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// The last [`DIAGNOSTIC_TAIL_LINES`] output lines, oldest first.
    pub tail: Vec<String>,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code as reported to users; signals map to -1.
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use ddpforge_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ddpforge_av::Result<()> {
/// let outcome = ToolCommand::new(PathBuf::from("/opt/dee/dee"))
///     .arg("-x")
///     .arg("/work/ddp_encode_pcm/ddp_encode_5_1.xml")
///     .current_dir("/opt/dee")
///     .run_with_progress(|ev| println!("{:.1}%", ev.percent))
///     .await?;
/// assert!(outcome.success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    bypass_validation: bool,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
            bypass_validation: false,
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

    /// Run the process from this directory.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set an extra environment variable for this invocation only.
    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Neutralize the engine's external schema validator for this run.
    pub fn bypass_validation(&mut self, bypass: bool) -> &mut Self {
        self.bypass_validation = bypass;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Build the tokio command. The returned shim, if any, must outlive the
    /// child process.
    fn prepare(&self) -> Result<(Command, Option<ValidatorShim>)> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }

        let shim = if self.bypass_validation {
            let shim = ValidatorShim::install()?;
            let current = self
                .envs
                .iter()
                .rev()
                .find(|(k, _)| k == "PATH")
                .map(|(_, v)| v.clone())
                .or_else(|| std::env::var_os("PATH"));
            cmd.env("PATH", shim.search_path(current)?);
            Some(shim)
        } else {
            None
        };

        Ok((cmd, shim))
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(self.program.to_string_lossy())
        } else {
            Error::Spawn {
                tool: self.program_name(),
                source: e,
            }
        }
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] / [`Error::Spawn`] if the process cannot start.
    /// - [`Error::ToolFailed`] if it exits non-zero; the message carries the
    ///   captured output.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();
        let (mut cmd, _shim) = self.prepare()?;
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("exec: {} {:?}", self.program.display(), self.args);

        let output = cmd
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            let mut captured = tool_output.stdout.trim().to_string();
            if !tool_output.stderr.trim().is_empty() {
                if !captured.is_empty() {
                    captured.push('\n');
                }
                captured.push_str(tool_output.stderr.trim());
            }
            return Err(Error::tool_failed(
                program_name,
                format!("exited with status {}: {}", output.status, captured),
            ));
        }

        Ok(tool_output)
    }

    /// Run the command, handing every stdout/stderr line to `on_line` as it
    /// arrives.
    ///
    /// Carriage returns split lines too, so tools redrawing a status line in
    /// place still produce one callback per update. Only the last
    /// [`DIAGNOSTIC_TAIL_LINES`] lines are retained.
    ///
    /// # Errors
    ///
    /// Fails only if the process cannot be spawned or waited on, or if Ctrl-C
    /// arrives while it runs (the child is killed best-effort). A non-zero
    /// exit is returned as an unsuccessful [`RunOutcome`].
    pub async fn stream<F>(&self, mut on_line: F) -> Result<RunOutcome>
    where
        F: FnMut(&str),
    {
        let program_name = self.program_name();
        let (mut cmd, _shim) = self.prepare()?;
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("spawn: {} {:?}", self.program.display(), self.args);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool_failed(&program_name, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool_failed(&program_name, "stderr not captured"))?;

        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let mut tail = Tail::new(DIAGNOSTIC_TAIL_LINES);

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut watch_interrupt = true;
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        while stdout_open || stderr_open {
            tokio::select! {
                segment = stdout.next_segment(), if stdout_open => match segment? {
                    Some(bytes) => tail.feed(&bytes, &mut on_line),
                    None => stdout_open = false,
                },
                segment = stderr.next_segment(), if stderr_open => match segment? {
                    Some(bytes) => tail.feed(&bytes, &mut on_line),
                    None => stderr_open = false,
                },
                signal = &mut interrupt, if watch_interrupt => {
                    if signal.is_ok() {
                        tracing::warn!("Interrupted; terminating {}", program_name);
                        if let Err(e) = child.start_kill() {
                            tracing::debug!("Failed to kill {}: {}", program_name, e);
                        }
                        return Err(Error::Interrupted { tool: program_name });
                    }
                    watch_interrupt = false;
                }
            }
        }

        let status = child.wait().await?;

        Ok(RunOutcome {
            exit_code: status.code(),
            tail: tail.into_lines(),
            elapsed: started.elapsed(),
        })
    }

    /// Run the command and report `Overall progress:` markers as
    /// [`ProgressEvent`]s. A final 100% event follows a successful exit.
    pub async fn run_with_progress<F>(&self, mut on_progress: F) -> Result<RunOutcome>
    where
        F: FnMut(ProgressEvent),
    {
        let monitor = ProgressMonitor::start();
        let outcome = self
            .stream(|line| match monitor.observe(line) {
                Some(event) => on_progress(event),
                None => tracing::trace!("{}", line),
            })
            .await?;

        if outcome.success() {
            on_progress(ProgressEvent::complete(monitor.elapsed()));
        }

        Ok(outcome)
    }
}

/// Bounded ring of recent output lines.
struct Tail {
    lines: VecDeque<String>,
    cap: usize,
}

impl Tail {
    fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn feed<F: FnMut(&str)>(&mut self, bytes: &[u8], on_line: &mut F) {
        let text = String::from_utf8_lossy(bytes);
        for part in text.split('\r') {
            let line = part.trim_end();
            if line.is_empty() {
                continue;
            }
            on_line(line);
            self.push(line.to_string());
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn tail_keeps_last_lines() {
        let mut tail = Tail::new(3);
        let mut seen = Vec::new();
        for i in 0..5 {
            tail.feed(format!("line {i}").as_bytes(), &mut |l: &str| seen.push(l.to_string()));
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(tail.into_lines(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn tail_splits_carriage_returns() {
        let mut tail = Tail::new(10);
        let mut seen = Vec::new();
        tail.feed(b"a: 1%\ra: 2%\ra: 3%\r", &mut |l: &str| seen.push(l.to_string()));
        assert_eq!(seen, vec!["a: 1%", "a: 2%", "a: 3%"]);
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new("nonexistent_tool_xyz_12345").execute().await;
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_captures_stdout() {
        let out = ToolCommand::new("sh")
            .args(["-c", "echo hello"])
            .execute()
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_reports_output_on_failure() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo broken stream; exit 3"])
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }));
        assert!(err.to_string().contains("broken stream"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_merges_stdout_and_stderr() {
        let mut seen = Vec::new();
        let outcome = ToolCommand::new("sh")
            .args(["-c", "echo out; echo err 1>&2"])
            .stream(|l| seen.push(l.to_string()))
            .await
            .unwrap();
        assert!(outcome.success());
        seen.sort();
        assert_eq!(seen, vec!["err", "out"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_outcome_not_an_error() {
        let outcome = ToolCommand::new("sh")
            .args(["-c", "for i in $(seq 1 50); do echo line $i; done; exit 2"])
            .stream(|_| {})
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.code(), 2);
        assert_eq!(outcome.tail.len(), DIAGNOSTIC_TAIL_LINES);
        assert_eq!(outcome.tail.last().map(String::as_str), Some("line 50"));
        assert_eq!(outcome.tail.first().map(String::as_str), Some("line 11"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn progress_events_are_emitted() {
        let mut events = Vec::new();
        let outcome = ToolCommand::new("sh")
            .args([
                "-c",
                "echo 'Overall progress: 10.0'; echo noise; echo 'Overall progress: 55.5'",
            ])
            .run_with_progress(|ev| events.push(ev.percent))
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(events, vec![10.0, 55.5, 100.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn env_and_current_dir_apply() {
        let dir = tempfile::tempdir().unwrap();
        let out = ToolCommand::new("sh")
            .args(["-c", "pwd; echo $DDPFORGE_TEST_VAR"])
            .current_dir(dir.path())
            .env("DDPFORGE_TEST_VAR", "present")
            .execute()
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let mut lines = out.stdout.lines();
        assert_eq!(
            Path::new(lines.next().unwrap()).canonicalize().unwrap(),
            canonical
        );
        assert_eq!(lines.next(), Some("present"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bypass_validation_prepends_shim() {
        let out = ToolCommand::new("sh")
            .args(["-c", "command -v xmllint"])
            .bypass_validation(true)
            .execute()
            .await
            .unwrap();
        assert!(out.stdout.contains(crate::shim::SHIM_DIR_PREFIX));
    }
}
