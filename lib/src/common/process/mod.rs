//! # Colugo Subprocess (`common::process`)
//!
//! File: lib/src/common/process/mod.rs
//!
//! ## Overview
//!
//! `Subprocess` is the façade over the process core: construct it with an
//! argument vector, optionally feed input, then wait for completion and read
//! the captured stdout/stderr together with the exit status.
//!
//! ## Architecture
//!
//! - `types`: argument vector, stream/launch configuration, exit status,
//!   wait policy, output buffers.
//! - `launcher`: creates the child and owns its OS handles (`ProcessHandle`).
//! - `drainer`: independent per-stream readers (`PipeDrainer`).
//! - `coordinator`: the single wait loop handling exit, pipe activity and the
//!   deadline.
//!
//! A `Subprocess` is a state machine:
//! `NotStarted → Running → {Exited, Killed, TimedOut} → Closed`. Once the
//! child has exited its status is cached and further `wait`/`communicate`
//! calls return it without touching the pipes again. A child that timed out
//! without being killed can be waited on again.
//!
//! A single child cannot be fed more input after `communicate` closed its
//! stdin; a request/response loop needs one `Subprocess` per round.
//!
//! ## Usage
//!
//! ```no_run
//! use colugo::{Argv, Subprocess, WaitOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), colugo::SubprocessError> {
//! let mut child = Subprocess::spawn(Argv::new(["sh", "-c", "sleep 10"])?, Default::default())?;
//! let options = WaitOptions::default().with_timeout(Duration::from_millis(100));
//! let result = child.communicate(None, &options).await?;
//! assert!(result.status.signal().is_some());
//! # Ok(())
//! # }
//! ```
//!
pub mod drainer;
pub mod launcher;
pub mod types;

mod coordinator;

pub use types::{
    timeout_from_secs, Argv, Communication, ExitStatus, LaunchOptions, OutputBuffer,
    ProcessState, StreamConfig, WaitOptions, DEFAULT_KILL_GRACE, RETURNCODE_UNDETERMINED,
};

use crate::common::text::{split_on_any, SplitOptions, WHITESPACE};
use crate::core::error::SubprocessError;
use coordinator::{Completion, StdinFeeder, WaitCoordinator};
use launcher::ProcessHandle;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// How long the input writer may lag behind a child that already exited.
const FEEDER_SETTLE: Duration = Duration::from_millis(250);

/// A child process plus everything captured from it.
#[derive(Debug)]
pub struct Subprocess {
    argv: Argv,
    launch: LaunchOptions,
    handle: Option<ProcessHandle>,
    pid: Option<u32>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    state: ProcessState,
    status: ExitStatus,
}

impl Subprocess {
    /// Prepares a subprocess without launching it.
    pub fn new(argv: Argv, launch: LaunchOptions) -> Self {
        Self {
            argv,
            launch,
            handle: None,
            pid: None,
            stdout: OutputBuffer::default(),
            stderr: OutputBuffer::default(),
            state: ProcessState::NotStarted,
            status: ExitStatus::Undetermined,
        }
    }

    /// Launches `argv` immediately. Launch failures are reported here, before
    /// any waiting happens.
    pub fn spawn(argv: Argv, launch: LaunchOptions) -> Result<Self, SubprocessError> {
        let mut subprocess = Self::new(argv, launch);
        subprocess.start()?;
        Ok(subprocess)
    }

    /// Launches a `NotStarted` subprocess. Starting one that is already
    /// running or finished is a no-op.
    pub fn start(&mut self) -> Result<(), SubprocessError> {
        match self.state {
            ProcessState::NotStarted => {}
            ProcessState::Closed => return Err(SubprocessError::Closed),
            _ => return Ok(()),
        }
        match launcher::spawn(&self.argv, &self.launch) {
            Ok(handle) => {
                self.pid = handle.pid();
                self.handle = Some(handle);
                self.state = ProcessState::Running;
                Ok(())
            }
            Err(err) => {
                self.state = ProcessState::Closed;
                Err(err)
            }
        }
    }

    /// Waits for the child under `options` without touching its stdin.
    #[instrument(skip_all, fields(command = %self.argv))]
    pub async fn wait(&mut self, options: &WaitOptions) -> Result<ExitStatus, SubprocessError> {
        self.ensure_started()?;
        if self.state.is_finished() {
            return Ok(self.status);
        }
        self.run(None, options).await
    }

    /// Feeds `input` (if any), closes stdin, waits for completion under
    /// `options` and returns everything captured so far.
    ///
    /// With `raise_on_timeout` a missed deadline is reported as
    /// `SubprocessError::Timeout` carrying the partial output; otherwise the
    /// result holds the partial output and a `Signaled` (killed) or
    /// `Undetermined` (left running) status.
    #[instrument(skip_all, fields(command = %self.argv))]
    pub async fn communicate(
        &mut self,
        input: Option<&str>,
        options: &WaitOptions,
    ) -> Result<Communication, SubprocessError> {
        self.ensure_started()?;
        if self.state.is_finished() {
            return Ok(self.communication());
        }

        let input = input.filter(|text| !text.is_empty());
        let handle = self.handle.as_mut().ok_or(SubprocessError::Closed)?;
        if input.is_some() && !handle.has_stdin() {
            return Err(SubprocessError::StdinNotConnected);
        }
        let feeder = match (handle.take_stdin(), input) {
            (Some(stdin), Some(text)) => Some(StdinFeeder::start(stdin, text.as_bytes().to_vec())),
            (Some(_stdin), None) => {
                debug!("Closed child stdin without input");
                None
            }
            (None, _) => None,
        };

        self.run(feeder, options).await?;
        Ok(self.communication())
    }

    /// Like `communicate`, then parses every whitespace-separated token of
    /// stdout as `T`, flattened across lines.
    pub async fn communicate_to_lines<T>(
        &mut self,
        input: Option<&str>,
        options: &WaitOptions,
    ) -> Result<Vec<T>, SubprocessError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let result = self.communicate(input, options).await?;
        Ok(parse_rows(&result.stdout)?.into_iter().flatten().collect())
    }

    /// Like `communicate`, then parses stdout as a table: one row per
    /// non-empty line, one `T` per whitespace-separated token.
    pub async fn communicate_to_table<T>(
        &mut self,
        input: Option<&str>,
        options: &WaitOptions,
    ) -> Result<Vec<Vec<T>>, SubprocessError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let result = self.communicate(input, options).await?;
        parse_rows(&result.stdout)
    }

    /// Writes raw bytes to the child's stdin, leaving it open.
    pub async fn write_stdin(&mut self, data: &[u8]) -> Result<(), SubprocessError> {
        self.ensure_started()?;
        self.handle
            .as_mut()
            .ok_or(SubprocessError::Closed)?
            .write_stdin(data)
            .await
    }

    /// Closes the child's stdin so it observes end-of-input.
    pub fn close_stdin(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.close_stdin();
        }
    }

    /// Releases the child: collects any output already available, kills the
    /// child if it is still running, and drops every OS handle. Idempotent.
    #[instrument(skip_all, fields(command = %self.argv))]
    pub async fn close(&mut self) -> Result<(), SubprocessError> {
        let Some(mut handle) = self.handle.take() else {
            self.state = ProcessState::Closed;
            return Ok(());
        };
        if let Err(err) = handle.pipes.drain_available(&mut self.stdout, &mut self.stderr) {
            debug!("Ignoring drain error while closing: {}", err);
        }
        let result = match self.state {
            ProcessState::Running | ProcessState::TimedOut => {
                warn!("Closing pid {:?} while it is still running; killing it", self.pid);
                handle.terminate(Duration::ZERO).await.map(|status| {
                    self.status = status;
                })
            }
            _ => Ok(()),
        };
        drop(handle);
        self.state = ProcessState::Closed;
        result
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.status
    }

    pub fn returncode(&self) -> i32 {
        self.status.returncode()
    }

    /// Captured stdout as text (invalid UTF-8 replaced).
    pub fn stdout(&self) -> String {
        self.stdout.text()
    }

    pub fn stderr(&self) -> String {
        self.stderr.text()
    }

    pub fn stdout_bytes(&self) -> &[u8] {
        self.stdout.as_bytes()
    }

    pub fn stderr_bytes(&self) -> &[u8] {
        self.stderr.as_bytes()
    }

    pub fn clear_stdout(&mut self) {
        self.stdout.clear();
    }

    pub fn clear_stderr(&mut self) {
        self.stderr.clear();
    }

    pub fn argv(&self) -> &Argv {
        &self.argv
    }

    pub fn command_string(&self) -> String {
        self.argv.command_string()
    }

    fn ensure_started(&mut self) -> Result<(), SubprocessError> {
        match self.state {
            ProcessState::Closed => Err(SubprocessError::Closed),
            ProcessState::NotStarted => self.start(),
            _ => Ok(()),
        }
    }

    fn communication(&self) -> Communication {
        Communication {
            stdout: self.stdout.text(),
            stderr: self.stderr.text(),
            status: self.status,
        }
    }

    /// Runs the wait loop and records its outcome before reporting anything
    /// to the caller.
    async fn run(
        &mut self,
        feeder: Option<StdinFeeder>,
        options: &WaitOptions,
    ) -> Result<ExitStatus, SubprocessError> {
        let handle = self.handle.as_mut().ok_or(SubprocessError::Closed)?;
        let completion = WaitCoordinator::new(handle, &mut self.stdout, &mut self.stderr)
            .wait(options)
            .await;

        let completion = match completion {
            Ok(completion) => completion,
            Err(err) => {
                if let Some(feeder) = feeder {
                    feeder.abort();
                }
                return Err(err);
            }
        };

        let elapsed = match completion {
            Completion::Exited(status) => {
                self.state = ProcessState::Exited;
                self.status = status;
                if let Some(feeder) = feeder {
                    feeder.finish_within(FEEDER_SETTLE).await?;
                }
                return Ok(status);
            }
            Completion::Killed { status, elapsed } => {
                self.state = ProcessState::Killed;
                self.status = status;
                elapsed
            }
            Completion::TimedOut { elapsed } => {
                self.state = ProcessState::TimedOut;
                self.status = ExitStatus::Undetermined;
                elapsed
            }
        };
        if let Some(feeder) = feeder {
            feeder.abort();
        }

        if options.raise_on_timeout {
            return Err(SubprocessError::Timeout {
                command: self.argv.command_string(),
                timeout: options.timeout.unwrap_or(elapsed),
                stdout: self.stdout.text(),
                stderr: self.stderr.text(),
            });
        }
        Ok(self.status)
    }
}

/// Splits `text` into rows of whitespace-separated tokens parsed as `T`.
/// Blank lines produce no row.
fn parse_rows<T>(text: &str) -> Result<Vec<Vec<T>>, SubprocessError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let options = SplitOptions::default().include_empty(false);
    text.lines()
        .map(|line| split_on_any(line, WHITESPACE, options))
        .filter(|tokens| !tokens.is_empty())
        .map(|tokens| {
            tokens
                .into_iter()
                .map(|token| {
                    token.parse::<T>().map_err(|e| SubprocessError::Parse {
                        reason: e.to_string(),
                        token,
                    })
                })
                .collect::<Result<Vec<T>, _>>()
        })
        .collect()
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_builds_table() {
        let rows: Vec<Vec<i64>> = parse_rows("1 2 3\n\n  4\t5  \n").unwrap();
        assert_eq!(rows, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_parse_rows_reports_bad_token() {
        let err = parse_rows::<u8>("1 2\n3 x\n").unwrap_err();
        match err {
            SubprocessError::Parse { token, .. } => assert_eq!(token, "x"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_subprocess_is_not_started() {
        let subprocess = Subprocess::new(Argv::new(["true"]).unwrap(), LaunchOptions::default());
        assert_eq!(subprocess.state(), ProcessState::NotStarted);
        assert_eq!(subprocess.pid(), None);
        assert_eq!(subprocess.returncode(), RETURNCODE_UNDETERMINED);
        assert_eq!(subprocess.command_string(), "true");
    }

    #[tokio::test]
    async fn test_failed_launch_closes_subprocess() {
        let mut subprocess = Subprocess::new(
            Argv::new(["/definitely/not/a/real/program"]).unwrap(),
            LaunchOptions::default(),
        );
        assert!(matches!(subprocess.start(), Err(SubprocessError::Launch { .. })));
        assert_eq!(subprocess.state(), ProcessState::Closed);
        let result = subprocess.wait(&WaitOptions::default()).await;
        assert!(matches!(result, Err(SubprocessError::Closed)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_communicate_starts_lazily_and_caches_result() {
        let mut subprocess = Subprocess::new(
            Argv::new(["sh", "-c", "echo 1 2; echo 3"]).unwrap(),
            LaunchOptions::default(),
        );
        let numbers: Vec<u32> = subprocess
            .communicate_to_lines(None, &WaitOptions::default())
            .await
            .unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(subprocess.state(), ProcessState::Exited);

        subprocess.clear_stdout();
        let again = subprocess.communicate(None, &WaitOptions::default()).await.unwrap();
        assert_eq!(again.stdout, "");
        assert_eq!(again.status, ExitStatus::Exited(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_input_without_stdin_is_rejected() {
        let launch = LaunchOptions::from(StreamConfig::new(false, true, true));
        let mut subprocess = Subprocess::spawn(Argv::new(["true"]).unwrap(), launch).unwrap();
        let result = subprocess.communicate(Some("data"), &WaitOptions::default()).await;
        assert!(matches!(result, Err(SubprocessError::StdinNotConnected)));
        subprocess.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_stdin_then_communicate() {
        let mut subprocess = Subprocess::spawn(Argv::new(["cat"]).unwrap(), LaunchOptions::default()).unwrap();
        subprocess.write_stdin(b"first ").await.unwrap();
        let result = subprocess.communicate(Some("second"), &WaitOptions::default()).await.unwrap();
        assert_eq!(result.stdout, "first second");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_child_can_be_waited_again() {
        let mut subprocess = Subprocess::spawn(
            Argv::new(["sh", "-c", "sleep 0.5; echo late"]).unwrap(),
            LaunchOptions::default(),
        )
        .unwrap();
        let patient = WaitOptions::default()
            .with_timeout(Duration::from_millis(50))
            .with_kill_on_timeout(false);

        let status = subprocess.wait(&patient).await.unwrap();
        assert_eq!(status, ExitStatus::Undetermined);
        assert_eq!(subprocess.state(), ProcessState::TimedOut);

        let status = subprocess.wait(&WaitOptions::default()).await.unwrap();
        assert_eq!(status, ExitStatus::Exited(0));
        assert_eq!(subprocess.stdout(), "late\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_kills_running_child() {
        let mut subprocess = Subprocess::spawn(
            Argv::new(["sleep", "30"]).unwrap(),
            LaunchOptions::default(),
        )
        .unwrap();
        subprocess.close().await.unwrap();
        assert_eq!(subprocess.state(), ProcessState::Closed);
        assert_eq!(subprocess.exit_status(), ExitStatus::Signaled(9));
        subprocess.close().await.unwrap();
        assert!(matches!(
            subprocess.write_stdin(b"x").await,
            Err(SubprocessError::Closed)
        ));
    }
}
