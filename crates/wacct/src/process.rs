//! Subprocess execution with captured output.
//!
//! Every external tool the harness drives (build system, compiler binary,
//! simulator) goes through [`run_captured`], which polls the child so that an
//! interrupt or timeout can kill it instead of waiting it out.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::CancelToken;

/// How often a running child is checked for exit, cancellation and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Errors from running a subprocess.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to launch: {0}")]
    Launch(#[source] io::Error),
    #[error("interrupted")]
    Cancelled,
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),
    #[error("failed waiting for process: {0}")]
    Wait(#[source] io::Error),
}

/// Human-readable program name of a command.
#[must_use]
pub fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Run a command to completion, capturing stdout and stderr.
///
/// Stdin is closed. On unix the child leads its own process group, and the
/// whole group is killed if `cancel` trips or `timeout` elapses first. A
/// child that dies from SIGINT, or exits after `cancel` tripped, counts as
/// cancelled.
///
/// # Errors
///
/// Returns [`ProcessError::Launch`] if the command could not be spawned,
/// [`ProcessError::Cancelled`] or [`ProcessError::TimedOut`] if it was killed.
pub fn run_captured(
    cmd: &mut Command,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(ProcessError::Launch)?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                kill(&mut child);
                return Err(ProcessError::Wait(e));
            }
        }
        if cancel.is_cancelled() {
            kill(&mut child);
            return Err(ProcessError::Cancelled);
        }
        if let Some(limit) = timeout
            && start.elapsed() >= limit
        {
            kill(&mut child);
            return Err(ProcessError::TimedOut(limit));
        }
        thread::sleep(POLL_INTERVAL);
    };
    let status = match exit_status(status, cancel) {
        Ok(status) => status,
        Err(e) => {
            kill(&mut child);
            return Err(e);
        }
    };

    let output = ProcessOutput {
        code: status.code(),
        stdout: join(stdout),
        stderr: join(stderr),
    };
    debug!(
        program = %program_name(cmd),
        code = ?output.code,
        elapsed_ms = start.elapsed().as_millis(),
        "process finished"
    );
    Ok(output)
}

/// Map an exit seen after an interrupt to [`ProcessError::Cancelled`].
///
/// The interrupt can reach the child first, so its exit may be observed
/// before the token trips.
fn exit_status(status: ExitStatus, cancel: &CancelToken) -> Result<ExitStatus, ProcessError> {
    if cancel.is_cancelled() || interrupted(status) {
        Err(ProcessError::Cancelled)
    } else {
        Ok(status)
    }
}

#[cfg(unix)]
fn interrupted(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(nix::sys::signal::Signal::SIGINT as i32)
}

#[cfg(not(unix))]
const fn interrupted(_status: ExitStatus) -> bool {
    false
}

fn kill(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = i32::try_from(child.id()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        // Descendants share the group; a leftover grandchild would keep the pipes open.
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    // The child may already have exited; reaping it is all that matters.
    let _ = child.kill();
    let _ = child.wait();
}

/// Read a pipe to the end on a helper thread so the child never blocks on a
/// full pipe buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    }))
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_captures_streams_and_code() {
        let out = run_captured(
            &mut sh("echo out; echo err >&2; exit 3"),
            &CancelToken::new(),
            None,
        )
        .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
    }

    #[test]
    fn test_launch_failure() {
        let err = run_captured(
            &mut Command::new("/nonexistent/wacct-test-binary"),
            &CancelToken::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Launch(_)));
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let err = run_captured(
            &mut sh("sleep 5"),
            &CancelToken::new(),
            Some(Duration::from_millis(50)),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut(_)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_cancelled_before_exit() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_captured(&mut sh("sleep 5"), &cancel, None).unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));
    }

    #[test]
    fn test_exit_after_cancel_is_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_captured(&mut sh("exit 0"), &cancel, None).unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));
    }

    #[test]
    fn test_sigint_death_is_cancelled() {
        use std::os::unix::process::ExitStatusExt;

        let interrupted = ExitStatus::from_raw(nix::sys::signal::Signal::SIGINT as i32);
        assert!(matches!(
            exit_status(interrupted, &CancelToken::new()),
            Err(ProcessError::Cancelled)
        ));

        let killed = ExitStatus::from_raw(nix::sys::signal::Signal::SIGKILL as i32);
        let status = exit_status(killed, &CancelToken::new()).unwrap();
        assert_eq!(status.code(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_timeout_kills_grandchildren() {
        let temp = tempfile::tempdir().unwrap();
        let pid_file = temp.path().join("pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

        let err = run_captured(
            &mut sh(&script),
            &CancelToken::new(),
            Some(Duration::from_millis(300)),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut(_)));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = std::path::Path::new("/proc").join(pid.trim()).join("stat");
        let deadline = Instant::now() + Duration::from_secs(2);
        // Gone, or a zombie waiting to be reaped by init
        let alive = || {
            std::fs::read_to_string(&stat)
                .is_ok_and(|s| !s.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')))
        };
        while alive() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!alive(), "grandchild {} outlived the timeout", pid.trim());
    }
}
