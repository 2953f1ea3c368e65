//! Process launching and control.
//!
//! The channel never touches `tokio::process` directly; it goes through the
//! [`Launcher`] and [`ProcessHandle`] traits so the spawn logic can be driven
//! against an in-memory process in tests.

use std::io;
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use super::{SpawnError, StdioConfig};

#[cfg(unix)]
pub use nix::sys::signal::Signal;

/// Signals that can be requested on platforms without POSIX signals. Every
/// variant terminates the process.
#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    SIGINT,
    SIGTERM,
    SIGKILL,
}

/// Boxed writable end of a child pipe.
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed readable end of a child pipe.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// A live process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Take ownership of stdin. Returns `None` once taken or when not piped.
    fn take_stdin(&mut self) -> Option<BoxWriter>;

    /// Take ownership of stdout. Returns `None` once taken or when not piped.
    fn take_stdout(&mut self) -> Option<BoxReader>;

    /// Take ownership of stderr. Returns `None` once taken or when not piped.
    fn take_stderr(&mut self) -> Option<BoxReader>;

    /// Get the process ID, if still running.
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit. Must be cancel safe.
    async fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Deliver a signal to the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn signal(&mut self, signal: Signal) -> io::Result<()>;
}

/// Starts processes.
pub trait Launcher: Send + Sync {
    /// Launch `command` with `args` and the given I/O wiring.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    fn launch(
        &self,
        command: &str,
        args: &[String],
        stdio: &StdioConfig,
    ) -> Result<Box<dyn ProcessHandle>, SpawnError>;
}

/// Launches real processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    fn launch(
        &self,
        command: &str,
        args: &[String],
        stdio: &StdioConfig,
    ) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(stdio.stdin.to_stdio())
            .stdout(stdio.stdout.to_stdio())
            .stderr(stdio.stderr.to_stdio());

        let child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(command, e))?;

        Ok(Box::new(ChildProcess { child }))
    }
}

/// A running child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    fn take_stdin(&mut self) -> Option<BoxWriter> {
        self.child.stdin.take().map(|s| Box::new(s) as BoxWriter)
    }

    fn take_stdout(&mut self) -> Option<BoxReader> {
        self.child.stdout.take().map(|s| Box::new(s) as BoxReader)
    }

    fn take_stderr(&mut self) -> Option<BoxReader> {
        self.child.stderr.take().map(|s| Box::new(s) as BoxReader)
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    #[cfg(unix)]
    fn signal(&mut self, signal: Signal) -> io::Result<()> {
        use nix::unistd::Pid;

        // A reaped child has no pid; there is nothing left to signal.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        nix::sys::signal::kill(Pid::from_raw(pid), signal).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn signal(&mut self, _signal: Signal) -> io::Result<()> {
        self.child.start_kill()
    }
}

/// Built-in stand-in for `echo`.
///
/// Prints its arguments joined by spaces and a newline, then exits
/// successfully. No argument is read as an option or escape sequence.
#[derive(Debug)]
pub struct EchoProcess {
    stdout: Option<Vec<u8>>,
}

impl EchoProcess {
    #[must_use]
    pub fn new(args: &[String]) -> Self {
        let mut line = args.join(" ");
        line.push('\n');
        Self {
            stdout: Some(line.into_bytes()),
        }
    }
}

#[async_trait]
impl ProcessHandle for EchoProcess {
    fn take_stdin(&mut self) -> Option<BoxWriter> {
        None
    }

    fn take_stdout(&mut self) -> Option<BoxReader> {
        self.stdout
            .take()
            .map(|line| Box::new(io::Cursor::new(line)) as BoxReader)
    }

    fn take_stderr(&mut self) -> Option<BoxReader> {
        None
    }

    fn id(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        Ok(ExitStatus::default())
    }

    fn signal(&mut self, _signal: Signal) -> io::Result<()> {
        Ok(())
    }
}
