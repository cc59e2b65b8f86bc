//! Synchronous subprocess execution with merged, fully buffered output.
//!
//! The [`CommandRunner`] trait decouples the orchestrator from process
//! spawning. Tests use scripted runners that return predetermined results
//! without spawning anything.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::RunResult;

/// Line separator used to reassemble captured output.
pub const LINE_SEPARATOR: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// Shell program plus the flag that makes it run a single command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
    flag: String,
}

impl Shell {
    pub fn new(program: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
        }
    }

    /// `cmd.exe /c` on Windows, `bash -lc` everywhere else.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::new("cmd.exe", "/c")
        } else {
            Self::new("bash", "-lc")
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.flag).arg(command);
        cmd
    }
}

/// Failure to obtain a result at all. A non-zero exit code is not a `RunError`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("create output pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("wait for command: {0}")]
    Wait(#[source] io::Error),

    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("read command output: {0}")]
    Output(String),
}

/// Abstraction over command execution backends.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion. Blocks until the process has been reaped.
    fn run(&self, command: &str) -> Result<RunResult, RunError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, command: &str) -> Result<RunResult, RunError> {
        (**self).run(command)
    }
}

/// Runs commands through a shell chosen once at construction.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: Shell,
    timeout: Option<Duration>,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(Shell::host())
    }
}

impl ShellRunner {
    pub fn new(shell: Shell) -> Self {
        Self {
            shell,
            timeout: None,
        }
    }

    /// Kill and reap the child if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, RunError> {
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(RunError::Wait);
        };
        match child.wait_timeout(timeout).map_err(RunError::Wait)? {
            Some(status) => Ok(status),
            None => {
                warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
                Err(RunError::TimedOut(timeout))
            }
        }
    }
}

impl CommandRunner for ShellRunner {
    #[instrument(skip_all, fields(shell = %self.shell.program))]
    fn run(&self, command: &str) -> Result<RunResult, RunError> {
        // One pipe for both streams keeps stdout and stderr in write order.
        let (reader, writer) = io::pipe().map_err(RunError::Pipe)?;
        let stderr_writer = writer.try_clone().map_err(RunError::Pipe)?;

        let mut cmd = self.shell.command(command);
        cmd.stdin(Stdio::null()).stdout(writer).stderr(stderr_writer);

        debug!("spawning child process");
        let start_time = Utc::now();
        let started = Instant::now();
        let spawned = cmd.spawn();
        // The parent's write ends must close or the reader never sees EOF.
        drop(cmd);
        let mut child = spawned.map_err(|source| RunError::Spawn {
            program: self.shell.program.clone(),
            source,
        })?;

        let output_handle = thread::spawn(move || read_lines(reader));

        let status = match self.wait(&mut child) {
            Ok(status) => status,
            Err(err) => {
                reap(&mut child);
                // Grandchildren may still hold the pipe open; the reader thread
                // finishes on its own once they exit.
                drop(output_handle);
                return Err(err);
            }
        };
        let elapsed = started.elapsed();
        let end_time = start_time + TimeDelta::from_std(elapsed).unwrap_or_else(|_| TimeDelta::zero());

        let output = join_output(output_handle)?;
        let exit_code = exit_code(status);
        debug!(exit_code, elapsed_ms = elapsed.as_millis() as u64, "command finished");

        Ok(RunResult {
            exit_code,
            output,
            start_time,
            end_time,
            duration: elapsed,
        })
    }
}

fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill after failed wait");
    }
    if let Err(err) = child.wait() {
        debug!(err = %err, "reap after kill");
    }
}

fn join_output(handle: thread::JoinHandle<io::Result<String>>) -> Result<String, RunError> {
    match handle.join() {
        Ok(result) => result.map_err(|err| RunError::Output(err.to_string())),
        Err(_) => Err(RunError::Output("output reader thread panicked".to_string())),
    }
}

/// Read until EOF, re-joining lines with [`LINE_SEPARATOR`].
fn read_lines<R: Read>(reader: R) -> io::Result<String> {
    let mut buf_reader = BufReader::new(reader);
    let mut output = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = buf_reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        output.push_str(&String::from_utf8_lossy(strip_line_ending(&line)));
        output.push_str(LINE_SEPARATOR);
    }

    Ok(output)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Exit code, or `128 + signal` for a signal-terminated Unix process.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lines_normalizes_separators() {
        let output = read_lines(&b"a\r\nb\nc"[..]).expect("read");
        assert_eq!(output, format!("a{0}b{0}c{0}", LINE_SEPARATOR));
    }

    #[test]
    fn read_lines_empty_stream() {
        assert_eq!(read_lines(&b""[..]).expect("read"), "");
    }

    #[test]
    fn host_shell_matches_platform() {
        let shell = Shell::host();
        if cfg!(windows) {
            assert_eq!((shell.program(), shell.flag()), ("cmd.exe", "/c"));
        } else {
            assert_eq!((shell.program(), shell.flag()), ("bash", "-lc"));
        }
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;

        fn sh() -> ShellRunner {
            ShellRunner::new(Shell::new("sh", "-c"))
        }

        #[test]
        fn captures_stdout() {
            let result = sh().run("echo hi").expect("run");
            assert_eq!(result.exit_code, 0);
            assert_eq!(result.output, "hi\n");
        }

        /// stderr lands in the same stream, in write order.
        #[test]
        fn merges_stderr_in_order() {
            let result = sh().run("echo one; echo two >&2; echo three").expect("run");
            assert_eq!(result.output, "one\ntwo\nthree\n");
        }

        #[test]
        fn non_zero_exit_is_a_result() {
            let result = sh().run("echo bad >&2; exit 3").expect("run");
            assert_eq!(result.exit_code, 3);
            assert_eq!(result.output, "bad\n");
        }

        #[test]
        fn signal_exit_maps_to_128_plus_signal() {
            let result = sh().run("kill -9 $$").expect("run");
            assert_eq!(result.exit_code, 137);
        }

        #[test]
        fn timing_is_ordered() {
            let result = sh().run("sleep 0.05").expect("run");
            assert!(result.end_time >= result.start_time);
            assert!(result.duration >= Duration::from_millis(50));
        }

        #[test]
        fn missing_shell_is_spawn_error() {
            let runner = ShellRunner::new(Shell::new("/nonexistent/taskrun-shell", "-c"));
            let err = runner.run("echo hi").unwrap_err();
            assert!(matches!(err, RunError::Spawn { .. }), "{err}");
        }

        #[test]
        fn timeout_kills_child() {
            let runner = sh().with_timeout(Duration::from_millis(100));
            let started = Instant::now();
            let err = runner.run("sleep 5").unwrap_err();
            assert!(matches!(err, RunError::TimedOut(_)), "{err}");
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        /// A background grandchild keeps the pipe open after the shell is
        /// killed; the timeout still returns without waiting for it.
        #[test]
        fn timeout_does_not_wait_for_pipe_holders() {
            let runner = sh().with_timeout(Duration::from_millis(100));
            let started = Instant::now();
            let err = runner.run("sleep 3 & sleep 3").unwrap_err();
            assert!(matches!(err, RunError::TimedOut(_)), "{err}");
            assert!(started.elapsed() < Duration::from_secs(3));
        }
    }
}
