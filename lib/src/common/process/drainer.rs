//! # Colugo Pipe Drainer
//!
//! File: lib/src/common/process/drainer.rs
//!
//! ## Overview
//!
//! Drains the child's stdout and stderr independently so that neither pipe
//! can fill up and block the child while the parent is busy with the other.
//!
//! ## Architecture
//!
//! Each connected output stream gets its own reader task that performs
//! blocking-style async reads and forwards every chunk over an unbounded
//! channel. Closing the channel marks end-of-file for that stream only.
//! `drain_available` then performs a non-blocking pass over both channels,
//! appending whatever has arrived to the caller's buffers. A shared `Notify`
//! is signalled after every chunk and at end-of-file so the wait coordinator
//! can sleep until there is something to drain instead of polling.
//!
//! Readers start as soon as the child is launched, so output is consumed
//! even before anybody calls `wait`.
//!
use super::types::OutputBuffer;
use crate::core::error::SubprocessError;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const READ_CHUNK_SIZE: usize = 8 * 1024;

type Chunk = io::Result<Vec<u8>>;

/// End-of-file state of both output streams after a drain pass.
///
/// A stream that is not connected counts as already at end-of-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainState {
    pub stdout_eof: bool,
    pub stderr_eof: bool,
}

impl DrainState {
    pub fn all_eof(&self) -> bool {
        self.stdout_eof && self.stderr_eof
    }
}

#[derive(Debug)]
struct StreamPipe {
    name: &'static str,
    rx: mpsc::UnboundedReceiver<Chunk>,
    reader: JoinHandle<()>,
    eof: bool,
}

impl StreamPipe {
    fn start<R>(name: &'static str, source: R, activity: Arc<Notify>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_to_channel(name, source, tx, activity));
        Self {
            name,
            rx,
            reader,
            eof: false,
        }
    }

    fn drain_into(&mut self, buffer: &mut OutputBuffer) -> Result<bool, SubprocessError> {
        while !self.eof {
            match self.rx.try_recv() {
                Ok(Ok(chunk)) => buffer.append(&chunk),
                // The reader stops after an error, so the next pass sees the
                // channel disconnected and reports end-of-file.
                Ok(Err(source)) => {
                    return Err(SubprocessError::io(
                        format!("reading child {}", self.name),
                        source,
                    ))
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Child {} reached end-of-file", self.name);
                    self.eof = true;
                }
            }
        }
        Ok(self.eof)
    }
}

async fn read_to_channel<R>(
    name: &'static str,
    mut source: R,
    tx: mpsc::UnboundedSender<Chunk>,
    activity: Arc<Notify>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let chunk = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let failed = chunk.is_err();
        if tx.send(chunk).is_err() || failed {
            break;
        }
        trace!("Read chunk from child {}", name);
        activity.notify_one();
    }
    drop(tx);
    activity.notify_one();
}

/// Independent, non-blocking drain of the child's stdout and stderr.
#[derive(Debug)]
pub struct PipeDrainer {
    stdout: Option<StreamPipe>,
    stderr: Option<StreamPipe>,
    activity: Arc<Notify>,
}

impl PipeDrainer {
    /// Starts one reader task per provided stream. Must be called from
    /// within a tokio runtime.
    pub fn start<O, E>(stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let activity = Arc::new(Notify::new());
        Self {
            stdout: stdout.map(|s| StreamPipe::start("stdout", s, Arc::clone(&activity))),
            stderr: stderr.map(|s| StreamPipe::start("stderr", s, Arc::clone(&activity))),
            activity,
        }
    }

    /// Appends whatever output has arrived since the last pass to the given
    /// buffers, without waiting for more.
    ///
    /// Both streams are serviced before an error from either is reported.
    pub fn drain_available(
        &mut self,
        stdout: &mut OutputBuffer,
        stderr: &mut OutputBuffer,
    ) -> Result<DrainState, SubprocessError> {
        let stdout_eof = drain_stream(&mut self.stdout, stdout);
        let stderr_eof = drain_stream(&mut self.stderr, stderr);
        Ok(DrainState {
            stdout_eof: stdout_eof?,
            stderr_eof: stderr_eof?,
        })
    }

    /// End-of-file state as of the last drain pass.
    pub fn state(&self) -> DrainState {
        DrainState {
            stdout_eof: self.stdout.as_ref().map_or(true, |p| p.eof),
            stderr_eof: self.stderr.as_ref().map_or(true, |p| p.eof),
        }
    }

    /// Resolves once new output or an end-of-file is available on either
    /// stream (or immediately if that happened since the last call).
    pub async fn activity(&self) {
        self.activity.notified().await;
    }
}

fn drain_stream(
    pipe: &mut Option<StreamPipe>,
    buffer: &mut OutputBuffer,
) -> Result<bool, SubprocessError> {
    match pipe {
        Some(pipe) => pipe.drain_into(buffer),
        None => Ok(true),
    }
}

impl Drop for PipeDrainer {
    fn drop(&mut self) {
        for pipe in [self.stdout.as_ref(), self.stderr.as_ref()].into_iter().flatten() {
            pipe.reader.abort();
        }
    }
}
