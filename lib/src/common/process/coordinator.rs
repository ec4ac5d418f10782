//! # Colugo Wait Coordinator
//!
//! File: lib/src/common/process/coordinator.rs
//!
//! ## Overview
//!
//! Drives a launched child to completion under an optional deadline while
//! keeping both output pipes drained, and decides what happens on timeout.
//!
//! ## Architecture
//!
//! A single loop parameterized by `WaitOptions` (deadline, kill, raise):
//! 1. drain whatever output is available;
//! 2. `select!` on child exit, the deadline, and pipe activity, in that order
//!    of priority, so the loop sleeps until something happens;
//! 3. on exit, keep draining until both pipes reach end-of-file. With a
//!    deadline set the drain stops at the deadline, but never sooner than
//!    `OUTPUT_SETTLE_WINDOW` after the exit was seen;
//! 4. on deadline, drain once more, then optionally terminate and reap the
//!    child.
//!
//! Raising a `Timeout` error is left to the façade, which must record the
//! final state before reporting it.
//!
use super::drainer::DrainState;
use super::launcher::ProcessHandle;
use super::types::{ExitStatus, OutputBuffer, WaitOptions};
use crate::core::error::SubprocessError;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Minimum time spent collecting output after the child exits or is killed.
const OUTPUT_SETTLE_WINDOW: Duration = Duration::from_millis(100);

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Exited(ExitStatus),
    /// The deadline elapsed and the child was terminated.
    Killed { status: ExitStatus, elapsed: Duration },
    /// The deadline elapsed and the child was left running.
    TimedOut { elapsed: Duration },
}

enum Event {
    Exited(io::Result<std::process::ExitStatus>),
    Deadline,
    Activity,
}

pub(crate) struct WaitCoordinator<'a> {
    handle: &'a mut ProcessHandle,
    stdout: &'a mut OutputBuffer,
    stderr: &'a mut OutputBuffer,
}

impl<'a> WaitCoordinator<'a> {
    pub(crate) fn new(
        handle: &'a mut ProcessHandle,
        stdout: &'a mut OutputBuffer,
        stderr: &'a mut OutputBuffer,
    ) -> Self {
        Self {
            handle,
            stdout,
            stderr,
        }
    }

    pub(crate) async fn wait(mut self, options: &WaitOptions) -> Result<Completion, SubprocessError> {
        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        debug!("Waiting for pid {:?} (deadline: {:?})", self.handle.pid(), options.timeout);

        loop {
            self.drain()?;
            match self.next_event(deadline).await {
                Event::Exited(result) => {
                    let status = result
                        .map(ExitStatus::from)
                        .map_err(|e| SubprocessError::io("waiting for child process", e))?;
                    let settle = Instant::now() + OUTPUT_SETTLE_WINDOW;
                    self.collect_remaining_output(deadline.map(|d| d.max(settle)))
                        .await?;
                    info!("pid {:?} finished with {}", self.handle.pid(), status);
                    return Ok(Completion::Exited(status));
                }
                Event::Deadline => return self.on_timeout(options, started.elapsed()).await,
                Event::Activity => {}
            }
        }
    }

    async fn next_event(&mut self, deadline: Option<Instant>) -> Event {
        let ProcessHandle { child, pipes, .. } = &mut *self.handle;
        tokio::select! {
            biased;
            result = child.wait() => Event::Exited(result),
            _ = sleep_until(deadline) => Event::Deadline,
            _ = pipes.activity() => Event::Activity,
        }
    }

    fn drain(&mut self) -> Result<DrainState, SubprocessError> {
        self.handle
            .pipes
            .drain_available(&mut *self.stdout, &mut *self.stderr)
    }

    /// Output written right before exit may still be in flight; read until
    /// both pipes close. Pending activity is serviced before the deadline,
    /// and the drain only gives up after a pass that found nothing new.
    async fn collect_remaining_output(&mut self, deadline: Option<Instant>) -> Result<(), SubprocessError> {
        // A descendant writing without pause still has to be cut off.
        let hard_stop = deadline.map(|d| d + OUTPUT_SETTLE_WINDOW);
        loop {
            let captured = self.captured_len();
            if self.drain()?.all_eof() {
                return Ok(());
            }
            let now = Instant::now();
            let expired = deadline.is_some_and(|d| now >= d);
            let stalled = self.captured_len() == captured;
            if (expired && stalled) || hard_stop.is_some_and(|h| now >= h) {
                warn!(
                    "pid {:?} exited but its output pipes are still open (held by a descendant?); keeping output captured so far",
                    self.handle.pid()
                );
                return Ok(());
            }
            if expired {
                // Give the reader tasks a turn, then recheck.
                tokio::task::yield_now().await;
                continue;
            }
            let pipes = &self.handle.pipes;
            tokio::select! {
                biased;
                _ = pipes.activity() => {}
                _ = sleep_until(deadline) => {}
            }
        }
    }

    fn captured_len(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }

    async fn on_timeout(
        mut self,
        options: &WaitOptions,
        elapsed: Duration,
    ) -> Result<Completion, SubprocessError> {
        self.drain()?;
        warn!(
            "pid {:?} still running after {:.3}s deadline",
            self.handle.pid(),
            elapsed.as_secs_f64()
        );
        if !options.kill_on_timeout {
            return Ok(Completion::TimedOut { elapsed });
        }

        let status = self.handle.terminate(options.kill_grace).await?;
        info!("Killed pid {:?} after timeout ({})", self.handle.pid(), status);
        let window = Instant::now() + OUTPUT_SETTLE_WINDOW;
        self.collect_remaining_output(Some(window)).await?;
        Ok(Completion::Killed { status, elapsed })
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Writes communicate() input on its own task, concurrently with the wait
/// loop. Dropping the stdin handle at the end signals end-of-input.
#[derive(Debug)]
pub(crate) struct StdinFeeder {
    task: JoinHandle<io::Result<()>>,
}

impl StdinFeeder {
    pub(crate) fn start(mut stdin: ChildStdin, input: Vec<u8>) -> Self {
        let task = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.flush().await?;
            debug!("Wrote {} bytes to child stdin", input.len());
            Ok(())
        });
        Self { task }
    }

    /// Reports the writer's outcome once the child has exited. A writer still
    /// blocked after `limit` (stdin held open by a descendant that never
    /// reads) is abandoned.
    pub(crate) async fn finish_within(mut self, limit: Duration) -> Result<(), SubprocessError> {
        match tokio::time::timeout(limit, &mut self.task).await {
            Ok(Ok(result)) => {
                result.map_err(|e| SubprocessError::io("writing to child stdin", e))
            }
            Ok(Err(join_error)) => Err(SubprocessError::io(
                "writing to child stdin",
                io::Error::other(join_error),
            )),
            Err(_) => {
                warn!("Input writer still blocked {:?} after child exit; abandoning it", limit);
                self.task.abort();
                Ok(())
            }
        }
    }

    pub(crate) fn abort(self) {
        self.task.abort();
    }
}

// --- Unit Tests ---
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::common::process::launcher::spawn;
    use crate::common::process::types::{Argv, LaunchOptions};

    fn launch(script: &str) -> ProcessHandle {
        spawn(&Argv::new(["sh", "-c", script]).unwrap(), &LaunchOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_wait_collects_output_and_status() {
        let mut handle = launch("echo out; echo err >&2; exit 3");
        let (mut out, mut err) = (OutputBuffer::default(), OutputBuffer::default());

        let completion = WaitCoordinator::new(&mut handle, &mut out, &mut err)
            .wait(&WaitOptions::default())
            .await
            .unwrap();

        assert_eq!(completion, Completion::Exited(ExitStatus::Exited(3)));
        assert_eq!(out.text(), "out\n");
        assert_eq!(err.text(), "err\n");
    }

    #[tokio::test]
    async fn test_timeout_without_kill_leaves_child_running() {
        let mut handle = launch("echo started; exec sleep 5");
        let (mut out, mut err) = (OutputBuffer::default(), OutputBuffer::default());
        let options = WaitOptions::default()
            .with_timeout(Duration::from_millis(100))
            .with_kill_on_timeout(false);

        let completion = WaitCoordinator::new(&mut handle, &mut out, &mut err)
            .wait(&options)
            .await
            .unwrap();

        assert!(matches!(completion, Completion::TimedOut { .. }));
        assert!(handle.try_status().unwrap().is_none(), "child should still be running");
        assert_eq!(out.text(), "started\n");
        handle.terminate(Duration::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_with_kill_reaps_child() {
        let mut handle = launch("exec sleep 5");
        let (mut out, mut err) = (OutputBuffer::default(), OutputBuffer::default());
        let options = WaitOptions::default().with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let completion = WaitCoordinator::new(&mut handle, &mut out, &mut err)
            .wait(&options)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        match completion {
            Completion::Killed { status, elapsed } => {
                assert_eq!(status, ExitStatus::Signaled(15));
                assert!(elapsed >= Duration::from_millis(100));
            }
            other => panic!("expected kill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feeder_delivers_input_and_eof() {
        let mut handle = launch("cat");
        let stdin = handle.take_stdin().unwrap();
        let feeder = StdinFeeder::start(stdin, b"piped input".to_vec());
        let (mut out, mut err) = (OutputBuffer::default(), OutputBuffer::default());

        let completion = WaitCoordinator::new(&mut handle, &mut out, &mut err)
            .wait(&WaitOptions::default())
            .await
            .unwrap();
        feeder.finish_within(Duration::from_secs(5)).await.unwrap();

        assert_eq!(completion, Completion::Exited(ExitStatus::Exited(0)));
        assert_eq!(out.text(), "piped input");
    }
}
