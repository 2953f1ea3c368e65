//! Events observable on an xargs channel.

use std::process::ExitStatus;

use super::XargsError;

/// Lifecycle events, delivered in the order they happen.
#[derive(Debug)]
pub enum XargsEvent {
    /// The process could not be started, or waiting on it failed. Fires at
    /// most once and never after `Exit`.
    Error(XargsError),
    /// The process terminated. A non-zero status is not an error.
    Exit(ExitStatus),
    /// The process output was fully drained and closed. Follows `Exit` when
    /// the process has no captured output.
    Close,
}
