//! Colored CLI diagnostics and exit code mapping.

use std::process::ExitStatus;

use owo_colors::OwoColorize;

use crate::xargs::{SpawnError, XargsError};

/// Exit code when the command exited with status 1-125.
pub const EXIT_COMMAND_FAILED: i32 = 123;
/// Exit code when the command exited with status 255.
pub const EXIT_COMMAND_255: i32 = 124;
/// Exit code when the command was killed by a signal.
pub const EXIT_COMMAND_SIGNALED: i32 = 125;
/// Exit code when the command could not be run.
pub const EXIT_CANNOT_RUN: i32 = 126;
/// Exit code when the command was not found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code for usage and configuration errors.
pub const EXIT_USAGE: i32 = 1;

/// Map a child exit status to this tool's exit code, following GNU xargs.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(0) => 0,
        Some(255) => EXIT_COMMAND_255,
        Some(_) => EXIT_COMMAND_FAILED,
        None => EXIT_COMMAND_SIGNALED,
    }
}

/// Exit code for a channel error.
#[must_use]
pub fn error_exit_code(err: &XargsError) -> i32 {
    match err {
        XargsError::Spawn(SpawnError::NotFound { .. }) => EXIT_NOT_FOUND,
        XargsError::Spawn(_) => EXIT_CANNOT_RUN,
        _ => EXIT_USAGE,
    }
}

/// Print an error to stderr.
pub fn print_error(err: &dyn std::fmt::Display) {
    eprintln!("{} {err}", "sxargs:".red().bold());
}

/// Report a command that did not exit cleanly.
pub fn print_exit_status(command: &str, status: ExitStatus) {
    match status.code() {
        Some(255) => eprintln!(
            "{} {}: exited with status 255; aborting",
            "sxargs:".yellow().bold(),
            command
        ),
        None => eprintln!(
            "{} {}: terminated by signal",
            "sxargs:".yellow().bold(),
            command
        ),
        _ => {}
    }
}
