//! Construction options for an xargs channel.

use std::fmt;
use std::process::Stdio;

use serde::{Deserialize, Serialize};

use crate::source::ItemStream;
use crate::tokenize;

use super::XargsError;

/// Name reported for the built-in echo used when no command is supplied.
pub const DEFAULT_COMMAND: &str = "echo";

/// How one of the child's standard descriptors is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioMode {
    /// Captured through a pipe owned by the channel.
    Piped,
    /// Shared with the current process.
    Inherit,
    /// Connected to the null device.
    Null,
}

impl StdioMode {
    #[must_use]
    pub fn to_stdio(self) -> Stdio {
        match self {
            Self::Piped => Stdio::piped(),
            Self::Inherit => Stdio::inherit(),
            Self::Null => Stdio::null(),
        }
    }
}

/// I/O configuration for the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioConfig {
    pub stdin: StdioMode,
    pub stdout: StdioMode,
    pub stderr: StdioMode,
}

impl StdioConfig {
    /// Default wiring: stderr passes through, stdout is captured, stdin is
    /// captured unless `discard_stdin` is set.
    #[must_use]
    pub fn resolve_default(discard_stdin: bool) -> Self {
        Self {
            stdin: if discard_stdin {
                StdioMode::Null
            } else {
                StdioMode::Piped
            },
            stdout: StdioMode::Piped,
            stderr: StdioMode::Inherit,
        }
    }
}

/// Where the channel collects arguments and input from.
#[derive(Default)]
pub enum InputMode {
    /// Items written into the channel become arguments; spawn once the
    /// writer finishes.
    #[default]
    Upstream,
    /// No collection: spawn right away.
    Disabled,
    /// This stream supplies the arguments; items written into the channel
    /// are buffered and become the child's stdin.
    External(ItemStream),
}

impl fmt::Debug for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream => f.write_str("Upstream"),
            Self::Disabled => f.write_str("Disabled"),
            Self::External(_) => f.write_str("External(..)"),
        }
    }
}

/// Options bag accepted by [`XargsChannel::new`](super::XargsChannel::new).
#[derive(Debug)]
pub struct XargsOptions {
    pub input: InputMode,
    /// Explicit I/O wiring. When set it is used verbatim and the defaults
    /// are not applied.
    pub stdio: Option<StdioConfig>,
    /// Command run when the command line is empty. `None` prints the
    /// collected arguments verbatim without starting a process.
    pub default_command: Option<String>,
}

impl Default for XargsOptions {
    fn default() -> Self {
        Self {
            input: InputMode::Upstream,
            stdio: None,
            default_command: None,
        }
    }
}

impl XargsOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable argument collection and spawn immediately.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.input = InputMode::Disabled;
        self
    }

    /// Take arguments from an external item stream.
    #[must_use]
    pub fn external(mut self, source: ItemStream) -> Self {
        self.input = InputMode::External(source);
        self
    }

    /// Wire the child's descriptors explicitly.
    #[must_use]
    pub fn stdio(mut self, stdio: StdioConfig) -> Self {
        self.stdio = Some(stdio);
        self
    }

    /// Set the command used when none is given.
    #[must_use]
    pub fn default_command(mut self, command: impl Into<String>) -> Self {
        self.default_command = Some(command.into());
        self
    }
}

/// The command to run, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommandLine {
    /// Use the configured default command.
    #[default]
    Default,
    /// A shell-style command line, tokenized on construction.
    Line(String),
    /// Pre-tokenized command and arguments.
    Argv(Vec<String>),
}

/// A command line after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// Print the collected arguments joined by spaces, like `echo` but
    /// without reading any of them as options.
    Echo,
    /// Run `command` with leading `args`.
    Exec { command: String, args: Vec<String> },
}

impl Program {
    /// The executable name, or `echo` for the built-in.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Echo => DEFAULT_COMMAND,
            Self::Exec { command, .. } => command,
        }
    }
}

impl CommandLine {
    /// Resolve into the program to run. An empty command line falls back to
    /// `default_command`, or to the built-in echo when there is none.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Tokenize` if a command line has unbalanced quotes.
    pub fn resolve(self, default_command: Option<&str>) -> Result<Program, XargsError> {
        let tokens = match self {
            Self::Default => Vec::new(),
            Self::Line(line) => tokenize::split(&line)?,
            Self::Argv(argv) => argv,
        };

        let mut tokens = tokens.into_iter();
        let program = match tokens.next() {
            Some(command) if !command.is_empty() => Program::Exec {
                command,
                args: tokens.collect(),
            },
            _ => default_command.map_or(Program::Echo, |command| Program::Exec {
                command: command.to_string(),
                args: Vec::new(),
            }),
        };
        Ok(program)
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv)
    }
}

impl From<Vec<&str>> for CommandLine {
    fn from(argv: Vec<&str>) -> Self {
        Self::Argv(argv.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(argv: [&str; N]) -> Self {
        Self::Argv(argv.into_iter().map(String::from).collect())
    }
}

impl<T: Into<CommandLine>> From<Option<T>> for CommandLine {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Default, Into::into)
    }
}
