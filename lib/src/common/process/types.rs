//! # Colugo Process Types
//!
//! File: lib/src/common/process/types.rs
//!
//! ## Overview
//!
//! Plain data types shared by the launcher, drainer, wait coordinator and the
//! `Subprocess` façade: the argument vector, stream and launch configuration,
//! exit status encoding, lifecycle state, wait policy and output buffers.
//!
use crate::core::error::SubprocessError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Sentinel returned by `ExitStatus::returncode` when no exit status is known
/// (for example after a timeout that did not kill the child).
pub const RETURNCODE_UNDETERMINED: i32 = i32::MIN;

/// Grace period between the polite termination request and the forceful kill.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(500);

/// Program name followed by its arguments. Never empty.
///
/// Arguments are passed to the child verbatim: there is no shell
/// interpretation, globbing or quoting involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argv(Vec<String>);

impl Argv {
    /// Builds an argument vector, rejecting an empty one.
    pub fn new<I, S>(args: I) -> Result<Self, SubprocessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(SubprocessError::EmptyCommand);
        }
        Ok(Self(args))
    }

    /// The program to execute (`argv[0]`).
    pub fn program(&self) -> &str {
        &self.0[0]
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Space-joined rendering used in log lines and error messages.
    pub fn command_string(&self) -> String {
        self.0.join(" ")
    }
}

impl TryFrom<Vec<String>> for Argv {
    type Error = SubprocessError;

    fn try_from(args: Vec<String>) -> Result<Self, Self::Error> {
        Argv::new(args)
    }
}

impl fmt::Display for Argv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_string())
    }
}

/// Which standard streams of the child are connected to pipes owned by the
/// parent. A stream that is not connected is inherited from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(true, true, true)
    }
}

impl StreamConfig {
    pub fn new(stdin: bool, stdout: bool, stderr: bool) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }
}

/// Everything the launcher needs besides the argument vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub streams: StreamConfig,
    /// Working directory of the child; inherited when `None`.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables, added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl LaunchOptions {
    pub fn with_streams(mut self, streams: StreamConfig) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl From<StreamConfig> for LaunchOptions {
    fn from(streams: StreamConfig) -> Self {
        LaunchOptions::default().with_streams(streams)
    }
}

/// Outcome of a child process as far as the parent knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitStatus {
    /// No status is known yet (still running, or abandoned after a timeout).
    #[default]
    Undetermined,
    /// The child exited normally with this code.
    Exited(i32),
    /// The child was terminated by this signal (including our own kill).
    Signaled(i32),
}

impl ExitStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Signaled(signal) => Some(*signal),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    pub fn is_determined(&self) -> bool {
        !matches!(self, ExitStatus::Undetermined)
    }

    /// Single-integer encoding: the exit code, `-signal` for signal
    /// termination, or `RETURNCODE_UNDETERMINED`.
    pub fn returncode(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(signal) => -*signal,
            ExitStatus::Undetermined => RETURNCODE_UNDETERMINED,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signaled(signal);
            }
        }
        ExitStatus::Undetermined
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(signal) => write!(f, "terminated by signal {}", signal),
            ExitStatus::Undetermined => f.write_str("undetermined"),
        }
    }
}

/// Lifecycle of a `Subprocess`.
///
/// `NotStarted → Running → {Exited, Killed, TimedOut} → Closed`; `Closed` is
/// reachable from every state, including `NotStarted` when the launch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Exited,
    Killed,
    /// The deadline elapsed and the child was left running.
    TimedOut,
    Closed,
}

impl ProcessState {
    /// Whether the child has terminated and its status is final.
    pub fn is_finished(&self) -> bool {
        matches!(self, ProcessState::Exited | ProcessState::Killed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::NotStarted => "not started",
            ProcessState::Running => "running",
            ProcessState::Exited => "exited",
            ProcessState::Killed => "killed",
            ProcessState::TimedOut => "timed out",
            ProcessState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Deadline and timeout policy for `wait` / `communicate`.
///
/// `kill_on_timeout` and `raise_on_timeout` are independent: a timed-out
/// child can be killed and reported as an error, killed and reported as a
/// result, left running and reported as an error, or left running with an
/// `Undetermined` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Maximum time to wait, measured from the start of the wait. `None` waits forever.
    pub timeout: Option<Duration>,
    pub kill_on_timeout: bool,
    pub raise_on_timeout: bool,
    /// Time allowed between the termination request and the forceful kill.
    pub kill_grace: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            kill_on_timeout: true,
            raise_on_timeout: false,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl WaitOptions {
    /// Sets the deadline. A zero duration means unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Sets the deadline in floating-point seconds. Zero, negative and
    /// non-finite values mean unbounded.
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = timeout_from_secs(secs);
        self
    }

    pub fn with_kill_on_timeout(mut self, kill: bool) -> Self {
        self.kill_on_timeout = kill;
        self
    }

    pub fn with_raise_on_timeout(mut self, raise: bool) -> Self {
        self.raise_on_timeout = raise;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}

/// Converts a seconds value to an optional deadline (`None` = unbounded).
pub fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Result of `Subprocess::communicate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Communication {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl Communication {
    pub fn returncode(&self) -> i32 {
        self.status.returncode()
    }
}

/// Append-only accumulator for one output stream of the child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
}

impl OutputBuffer {
    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Buffer contents as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
