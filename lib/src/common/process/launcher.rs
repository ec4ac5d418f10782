//! # Colugo Process Launcher
//!
//! File: lib/src/common/process/launcher.rs
//!
//! ## Overview
//!
//! Starts the child process and owns everything the OS handed back for it:
//! the process handle, the stdin write end, and (through the `PipeDrainer`)
//! the stdout/stderr read ends.
//!
//! ## Architecture
//!
//! - **`spawn`**: builds a `tokio::process::Command` from the argument vector
//!   (no shell), wires each standard stream to a pipe or to the parent's own
//!   stream, and starts the drainer's reader tasks. Launch failures (missing
//!   executable, permission denied, resource exhaustion) surface synchronously
//!   as `SubprocessError::Launch`.
//! - **`ProcessHandle::terminate`**: polite termination (SIGTERM on Unix),
//!   a grace period, then a forceful kill; always reaps the child.
//!
//! The child is configured with `kill_on_drop`, so dropping a handle whose
//! child is still running kills it instead of leaking it.
//!
use super::drainer::PipeDrainer;
use super::types::{Argv, ExitStatus, LaunchOptions};
use crate::core::error::SubprocessError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, error, info, warn};

/// Exclusive owner of a running child and its pipe endpoints.
///
/// Not `Clone`: there is exactly one owner, and releasing it (drop) closes
/// every endpoint once.
#[derive(Debug)]
pub struct ProcessHandle {
    pub(super) child: Child,
    pub(super) pipes: PipeDrainer,
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
}

/// Launches `argv` with the given stream wiring, working directory and
/// environment. Must be called from within a tokio runtime.
pub fn spawn(argv: &Argv, options: &LaunchOptions) -> Result<ProcessHandle, SubprocessError> {
    let mut command = Command::new(argv.program());
    command
        .args(argv.args())
        .stdin(stdio_for(options.streams.stdin))
        .stdout(stdio_for(options.streams.stdout))
        .stderr(stdio_for(options.streams.stderr))
        .envs(&options.env)
        .kill_on_drop(true);
    if let Some(dir) = &options.working_dir {
        command.current_dir(dir);
    }

    debug!(
        "Launching `{}` (streams: {:?}, cwd: {:?})",
        argv, options.streams, options.working_dir
    );
    let mut child = command.spawn().map_err(|source| {
        error!("Failed to launch `{}`: {}", argv, source);
        SubprocessError::Launch {
            command: argv.command_string(),
            source,
        }
    })?;

    let pid = child.id();
    let stdin = child.stdin.take();
    let pipes = PipeDrainer::start(child.stdout.take(), child.stderr.take());
    info!("Launched `{}` with pid {:?}", argv, pid);

    Ok(ProcessHandle {
        child,
        pipes,
        stdin,
        pid,
    })
}

fn stdio_for(connected: bool) -> Stdio {
    if connected {
        Stdio::piped()
    } else {
        Stdio::inherit()
    }
}

impl ProcessHandle {
    /// OS process id assigned at launch.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    pub(super) fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Closes the stdin write end so the child observes end-of-input.
    pub fn close_stdin(&mut self) {
        if self.stdin.take().is_some() {
            debug!("Closed stdin of pid {:?}", self.pid);
        }
    }

    /// Writes `data` to the child's stdin, leaving it open for more.
    pub async fn write_stdin(&mut self, data: &[u8]) -> Result<(), SubprocessError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(SubprocessError::StdinNotConnected)?;
        stdin
            .write_all(data)
            .await
            .map_err(|e| SubprocessError::io("writing to child stdin", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| SubprocessError::io("flushing child stdin", e))
    }

    /// Non-blocking check for an exit status.
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>, SubprocessError> {
        self.child
            .try_wait()
            .map(|status| status.map(ExitStatus::from))
            .map_err(|e| SubprocessError::io("checking child status", e))
    }

    /// Stops the child and reaps it, returning its final status.
    ///
    /// With a non-zero `grace` the child first gets a termination request
    /// (SIGTERM on Unix) and `grace` to exit on its own; after that, or
    /// immediately with a zero grace, it is killed forcefully.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus, SubprocessError> {
        if let Some(status) = self.try_status()? {
            return Ok(status);
        }

        if !grace.is_zero() && self.request_termination() {
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(result) => {
                    return result
                        .map(ExitStatus::from)
                        .map_err(|e| SubprocessError::io("waiting for terminated child", e));
                }
                Err(_) => warn!(
                    "pid {:?} ignored termination request for {:?}; killing",
                    self.pid, grace
                ),
            }
        }

        if let Err(e) = self.child.start_kill() {
            // The child may have exited between the status check and the kill.
            if let Some(status) = self.try_status()? {
                return Ok(status);
            }
            return Err(SubprocessError::io("killing child process", e));
        }
        self.child
            .wait()
            .await
            .map(ExitStatus::from)
            .map_err(|e| SubprocessError::io("reaping killed child", e))
    }

    #[cfg(unix)]
    fn request_termination(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return false;
        };
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => {
                debug!("Sent SIGTERM to pid {}", pid);
                true
            }
            Err(errno) => {
                debug!("Could not send SIGTERM to pid {}: {}", pid, errno);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&self) -> bool {
        false
    }
}

// --- Unit Tests ---
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::common::process::types::{OutputBuffer, StreamConfig};

    fn argv(args: &[&str]) -> Argv {
        Argv::new(args.iter().copied()).unwrap()
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails_synchronously() {
        let result = spawn(
            &argv(&["/definitely/not/a/real/program"]),
            &LaunchOptions::default(),
        );
        match result {
            Err(SubprocessError::Launch { command, source }) => {
                assert_eq!(command, "/definitely/not/a/real/program");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected launch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_records_pid_and_stdin() {
        let mut handle = spawn(&argv(&["cat"]), &LaunchOptions::default()).unwrap();
        assert!(handle.pid().is_some());
        assert!(handle.has_stdin());
        handle.close_stdin();
        assert!(!handle.has_stdin());
        let status = handle.terminate(Duration::from_secs(5)).await.unwrap();
        // cat exits on EOF or on SIGTERM; either way it is reaped.
        assert!(status.is_determined());
    }

    #[tokio::test]
    async fn test_unconnected_stdin_is_not_exposed() {
        let options = LaunchOptions::default().with_streams(StreamConfig::new(false, true, true));
        let mut handle = spawn(&argv(&["true"]), &options).unwrap();
        assert!(!handle.has_stdin());
        let result = handle.write_stdin(b"ignored").await;
        assert!(matches!(result, Err(SubprocessError::StdinNotConnected)));
        handle.terminate(Duration::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn test_terminate_uses_sigterm_first() {
        let mut handle = spawn(&argv(&["sleep", "30"]), &LaunchOptions::default()).unwrap();
        let status = handle.terminate(Duration::from_secs(5)).await.unwrap();
        assert_eq!(status, ExitStatus::Signaled(15));
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        // The shell ignores SIGTERM, so only the forceful kill ends it.
        let mut handle = spawn(
            &argv(&["sh", "-c", "trap '' TERM; echo ready; while :; do sleep 1; done"]),
            &LaunchOptions::default(),
        )
        .unwrap();

        // Wait until the trap is installed before sending anything.
        let (mut out, mut err) = (OutputBuffer::default(), OutputBuffer::default());
        while out.is_empty() {
            handle.pipes.activity().await;
            handle.pipes.drain_available(&mut out, &mut err).unwrap();
        }

        let status = handle.terminate(Duration::from_millis(200)).await.unwrap();
        assert_eq!(status, ExitStatus::Signaled(9));
    }

    #[tokio::test]
    async fn test_working_dir_and_env_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let options = LaunchOptions::default()
            .with_working_dir(dir.path())
            .with_env("COLUGO_TEST_VALUE", "forty-two");
        let mut handle = spawn(&argv(&["sh", "-c", "pwd; echo $COLUGO_TEST_VALUE"]), &options).unwrap();

        let (mut out, mut err) = (OutputBuffer::default(), OutputBuffer::default());
        loop {
            let state = handle.pipes.drain_available(&mut out, &mut err).unwrap();
            if state.all_eof() {
                break;
            }
            handle.pipes.activity().await;
        }
        let status = handle.child.wait().await.unwrap();
        assert!(status.success());

        let text = out.text();
        let mut lines = text.lines();
        let cwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(cwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
        assert_eq!(lines.next(), Some("forty-two"));
    }
}
