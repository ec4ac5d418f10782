//! # Colugo Run Integration Tests
//!
//! File: cli/tests/run.rs
//!
//! ## Overview
//!
//! Integration tests for `colugo run`: output echoing, input feeding, exit
//! code mapping for normal exits, signals, timeouts and launch failures, and
//! configuration defaults picked up from `.colugo.toml`.
//!
#![cfg(unix)]

mod common;
use common::*;
use predicates::prelude::*;
use std::fs;
use std::time::{Duration, Instant};

/// # Test Run Echo (`test_run_echo`)
#[test]
fn test_run_echo() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["run", "--", "echo", "hello", "world"])
        .assert()
        .success()
        .stdout("hello world\n")
        .stderr("");
}

#[test]
fn test_run_propagates_exit_code_and_stderr() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["run", "--", "sh", "-c", "echo out; echo err >&2; exit 3"])
        .assert()
        .code(3)
        .stdout("out\n")
        .stderr(predicate::str::contains("err\n"));
}

#[test]
fn test_run_with_input() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["run", "--input", "hello", "--", "cat"])
        .assert()
        .success()
        .stdout("hello");
}

#[test]
fn test_run_with_input_file() {
    let sandbox = Sandbox::new();
    let input = sandbox.project_dir().join("input.txt");
    fs::write(&input, "from a file\n").unwrap();
    sandbox
        .cmd()
        .args(["run", "--input-file"])
        .arg(&input)
        .args(["--", "cat"])
        .assert()
        .success()
        .stdout("from a file\n");
}

#[test]
fn test_run_missing_program_exits_127() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["run", "--", "/nonexistent/colugo-program"])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("Failed to launch"));
}

#[test]
fn test_run_timeout_kills_with_signal_exit_code() {
    let sandbox = Sandbox::new();
    let started = Instant::now();
    sandbox
        .cmd()
        .args(["run", "-t", "0.2", "--", "sh", "-c", "echo partial; exec sleep 5"])
        .assert()
        .code(128 + 15)
        .stdout("partial\n");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_run_raise_on_timeout_exits_124() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args([
            "run",
            "-t",
            "0.2",
            "--raise-on-timeout",
            "--",
            "sh",
            "-c",
            "echo partial; exec sleep 5",
        ])
        .assert()
        .code(124)
        .stdout("partial\n")
        .stderr(predicate::str::contains("timed out"));
}

#[test]
fn test_run_table_format() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["run", "--format", "table", "--", "printf", "a  b\\n\\nc d\\n"])
        .assert()
        .success()
        .stdout("a\tb\nc\td\n");
}

#[test]
fn test_run_lines_format() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["run", "--format", "lines", "--", "echo", "1 2", "3"])
        .assert()
        .success()
        .stdout("1\n2\n3\n");
}

#[test]
fn test_run_env_and_cwd() {
    let sandbox = Sandbox::new();
    let workdir = sandbox.project_dir().join("work");
    fs::create_dir(&workdir).unwrap();
    sandbox
        .cmd()
        .args(["run", "-e", "COLUGO_GREETING=hi", "-C"])
        .arg(&workdir)
        .args(["--", "sh", "-c", "echo $COLUGO_GREETING; basename \"$(pwd -P)\""])
        .assert()
        .success()
        .stdout("hi\nwork\n");
}

#[test]
fn test_run_uses_project_config_timeout() {
    let sandbox = Sandbox::new();
    sandbox.write_project_config("[subprocess]\ntimeout_secs = 0.2\nraise_on_timeout = true\n");
    sandbox
        .cmd()
        .args(["run", "--", "sleep", "5"])
        .assert()
        .code(124);
}

#[test]
fn test_run_flag_overrides_config() {
    let sandbox = Sandbox::new();
    sandbox.write_user_config("[subprocess]\nraise_on_timeout = true\n");
    sandbox
        .cmd()
        .args(["run", "-t", "0.2", "--no-raise-on-timeout", "--", "sleep", "5"])
        .assert()
        .code(128 + 15);
}

#[test]
fn test_run_invalid_config_fails() {
    let sandbox = Sandbox::new();
    sandbox.write_project_config("[subprocess]\nunknown_key = 1\n");
    sandbox
        .cmd()
        .args(["run", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

/// # Test Input Not Consumed (`test_run_child_ignoring_input_keeps_output_and_code`)
///
/// The program exits without reading a 4 MiB input. Its output and exit
/// code still come through, with a warning about the broken pipe.
#[test]
fn test_run_child_ignoring_input_keeps_output_and_code() {
    let sandbox = Sandbox::new();
    let input = sandbox.project_dir().join("big-input.txt");
    fs::write(&input, "y".repeat(4 * 1024 * 1024)).unwrap();
    sandbox
        .cmd()
        .args(["run", "--input-file"])
        .arg(&input)
        .args(["--", "sh", "-c", "echo early; echo gone >&2; exit 3"])
        .assert()
        .code(3)
        .stdout("early\n")
        .stderr(predicate::str::contains("gone\n"))
        .stderr(predicate::str::contains("Warning:"));
}
