//! # Colugo Run Handler
//!
//! File: cli/src/commands/run.rs
//!
//! ## Overview
//!
//! Implements `colugo run`: launches a program from an explicit argument
//! vector (no shell), optionally feeds it input, captures stdout and stderr,
//! enforces an optional deadline and reports the program's exit status as
//! Colugo's own exit code.
//!
//! ## Architecture
//!
//! 1. Load the layered configuration (`core::config`) for the default wait
//!    policy and launch options.
//! 2. Apply command-line overrides on top (`-t`, kill/raise flags, streams,
//!    working directory, environment).
//! 3. Run the program through `Subprocess::communicate` (or one of the
//!    row-parsing variants for `--format lines|table`).
//! 4. Echo captured stdout to stdout and captured stderr to stderr.
//! 5. Map the outcome to an exit code: the program's own code, `128 + signal`
//!    when it was killed by a signal, `124` when it was abandoned after a
//!    timeout.
//!
//! Launch failures and raised timeouts are returned as errors; `main.rs`
//! turns them into exit codes 127 and 124. A program that exits without
//! reading all of its input still gets its output echoed and its own exit
//! code, with a warning about the undelivered input.
//!
//! ## Usage
//!
//! ```bash
//! # Capture output of a command
//! colugo run -- ls -la
//!
//! # Give up after 2.5 seconds, killing the program
//! colugo run -t 2.5 -- ./slow-script.sh
//!
//! # Feed input and parse whitespace-separated output as rows
//! colugo run --input "3 1 2" --format table -- sort
//! ```
//!
use anyhow::Context;
use clap::{Parser, ValueEnum};
use colugo::common::text::{split, SplitOptions};
use colugo::core::config;
use colugo::core::error::{ColugoError, Result};
use colugo::{Argv, ExitStatus, LaunchOptions, Subprocess, SubprocessError, WaitOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exit code used when the program was abandoned (or reported) after its deadline.
pub const EXIT_TIMEOUT: i32 = 124;
/// Exit code used when the program could not be launched.
pub const EXIT_LAUNCH_FAILED: i32 = 127;

/// How captured stdout is echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Byte-for-byte as the program wrote it.
    #[default]
    Raw,
    /// One whitespace-separated token per line.
    Lines,
    /// One row per non-empty line, tokens separated by tabs.
    Table,
}

/// # Run Arguments (`RunArgs`)
///
/// Command-line options for `colugo run`. Options that are not given fall
/// back to the configuration files.
#[derive(Parser, Debug)]
#[command(
    about = "Run a program with captured output and an optional deadline",
    long_about = "Launches PROGRAM with ARGS (no shell involved), drains its stdout and stderr \
                  concurrently, and exits with the program's exit status."
)]
pub struct RunArgs {
    /// Deadline in seconds (fractions allowed); 0 means no deadline.
    #[arg(short, long, value_name = "SECS", value_parser = parse_timeout)]
    timeout: Option<f64>,

    /// Kill the program when the deadline elapses.
    #[arg(long, conflicts_with = "no_kill_on_timeout")]
    kill_on_timeout: bool,

    /// Leave the program running when the deadline elapses.
    #[arg(long)]
    no_kill_on_timeout: bool,

    /// Report a missed deadline as an error.
    #[arg(long, conflicts_with = "no_raise_on_timeout")]
    raise_on_timeout: bool,

    /// Report a missed deadline through the exit status only.
    #[arg(long)]
    no_raise_on_timeout: bool,

    /// Time between the termination request and the forceful kill.
    #[arg(long, value_name = "MS")]
    kill_grace_ms: Option<u64>,

    /// Text written to the program's stdin.
    #[arg(short, long, value_name = "TEXT", conflicts_with = "input_file")]
    input: Option<String>,

    /// File whose contents are written to the program's stdin.
    #[arg(long, value_name = "PATH")]
    input_file: Option<PathBuf>,

    /// Let the program inherit Colugo's stdin instead of a pipe.
    #[arg(long, conflicts_with_all = ["input", "input_file"])]
    no_stdin: bool,

    /// Let the program write directly to Colugo's stdout (not captured).
    #[arg(long)]
    no_stdout: bool,

    /// Let the program write directly to Colugo's stderr (not captured).
    #[arg(long)]
    no_stderr: bool,

    /// Working directory for the program.
    #[arg(short = 'C', long = "cwd", value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Extra environment variable for the program (repeatable).
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// How to echo captured stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
    format: OutputFormat,

    /// The program to run followed by its arguments.
    #[arg(required = true, last = true, value_name = "PROGRAM")]
    command: Vec<String>,
}

impl RunArgs {
    fn wait_options(&self, mut options: WaitOptions) -> WaitOptions {
        if let Some(secs) = self.timeout {
            options = options.with_timeout_secs(secs);
        }
        if self.kill_on_timeout {
            options = options.with_kill_on_timeout(true);
        } else if self.no_kill_on_timeout {
            options = options.with_kill_on_timeout(false);
        }
        if self.raise_on_timeout {
            options = options.with_raise_on_timeout(true);
        } else if self.no_raise_on_timeout {
            options = options.with_raise_on_timeout(false);
        }
        if let Some(ms) = self.kill_grace_ms {
            options = options.with_kill_grace(Duration::from_millis(ms));
        }
        options
    }

    fn launch_options(&self, mut options: LaunchOptions) -> LaunchOptions {
        options.streams.stdin &= !self.no_stdin;
        options.streams.stdout &= !self.no_stdout;
        options.streams.stderr &= !self.no_stderr;
        if self.input.is_some() || self.input_file.is_some() {
            options.streams.stdin = true;
        }
        if let Some(dir) = &self.cwd {
            options.working_dir = Some(dir.clone());
        }
        for (key, value) in &self.env {
            options.env.insert(key.clone(), value.clone());
        }
        options
    }

    fn read_input(&self) -> Result<Option<String>> {
        if let Some(text) = &self.input {
            return Ok(Some(text.clone()));
        }
        match &self.input_file {
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("Failed to read input file: {}", path.display())),
            None => Ok(None),
        }
    }
}

fn parse_timeout(value: &str) -> std::result::Result<f64, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("timeout must be finite and non-negative, got '{}'", value));
    }
    Ok(secs)
}

fn parse_env_pair(value: &str) -> std::result::Result<(String, String), String> {
    let opts = SplitOptions::default().max_splits(1).trim_tokens(false);
    match split(value, "=", opts).as_slice() {
        [key, val] if !key.is_empty() => Ok((key.clone(), val.clone())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}

/// # Handle Run Command (`handle_run`)
///
/// Runs the program and echoes its output. Returns the exit code Colugo
/// should terminate with.
pub async fn handle_run(args: RunArgs) -> Result<i32> {
    info!("Handling run command...");
    debug!("Run args: {:?}", args);

    let cfg = config::load_config().context("Failed to load Colugo configuration")?;
    let wait = args.wait_options(cfg.wait_options());
    let launch = args.launch_options(cfg.launch_options());
    let input = args.read_input()?;
    let argv = Argv::new(args.command.iter().cloned())
        .map_err(|e| anyhow::anyhow!(ColugoError::ArgumentParsing(e.to_string())))?;

    debug!("Wait options: {:?}", wait);
    let mut child = Subprocess::spawn(argv, launch)?;
    let formatted = match communicate(&mut child, args.format, input.as_deref(), &wait).await {
        Ok(formatted) => formatted,
        Err(err) => {
            // Whatever was captured before the failure is still shown.
            let captured = matches!(
                err,
                SubprocessError::Timeout { .. } | SubprocessError::Io { .. }
            );
            if captured {
                echo_output(&child, None)?;
            }
            let status = child.exit_status();
            if let Err(close_err) = child.close().await {
                debug!("Ignoring error while closing after failure: {}", close_err);
            }
            // An I/O failure after the program exited (e.g. it stopped reading
            // its input) does not hide the program's own exit status.
            if matches!(err, SubprocessError::Io { .. }) && status != ExitStatus::Undetermined {
                let err = anyhow::Error::from(err);
                warn!("`{}` finished with {}, but: {:#}", child.command_string(), status, err);
                eprintln!("Warning: {:#}", err);
                return Ok(exit_code_for_status(status));
            }
            return Err(err.into());
        }
    };

    echo_output(&child, formatted)?;
    let status = child.exit_status();
    child.close().await?;
    let code = exit_code_for_status(status);
    info!("`{}` finished: {} (exit code {})", child.command_string(), status, code);
    Ok(code)
}

/// Runs the child to completion and renders stdout for the non-raw formats.
async fn communicate(
    child: &mut Subprocess,
    format: OutputFormat,
    input: Option<&str>,
    wait: &WaitOptions,
) -> std::result::Result<Option<String>, SubprocessError> {
    match format {
        OutputFormat::Raw => {
            child.communicate(input, wait).await?;
            Ok(None)
        }
        OutputFormat::Lines => {
            let tokens: Vec<String> = child.communicate_to_lines(input, wait).await?;
            Ok(Some(tokens.join("\n")))
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = child.communicate_to_table(input, wait).await?;
            let lines: Vec<String> = rows.iter().map(|row| row.join("\t")).collect();
            Ok(Some(lines.join("\n")))
        }
    }
}

fn echo_output(child: &Subprocess, formatted: Option<String>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    match formatted {
        Some(text) if !text.is_empty() => writeln!(stdout, "{}", text),
        Some(_) => Ok(()),
        None => stdout.write_all(child.stdout_bytes()),
    }
    .context("Failed to write program output to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;

    std::io::stderr()
        .lock()
        .write_all(child.stderr_bytes())
        .context("Failed to write program output to stderr")
}

/// Maps a child's final status to Colugo's exit code.
pub fn exit_code_for_status(status: ExitStatus) -> i32 {
    match status {
        ExitStatus::Exited(code) => code,
        ExitStatus::Signaled(signal) => 128 + signal,
        ExitStatus::Undetermined => {
            warn!("Program was left running after its deadline");
            EXIT_TIMEOUT
        }
    }
}
