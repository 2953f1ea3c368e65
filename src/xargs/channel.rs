//! The xargs channel: a handle plus the driver task that owns its state.
//!
//! Every operation on [`XargsChannel`] is a message to a single driver task,
//! so the collect/spawn/wire state machine runs on one logical thread and
//! each transition happens in one step.

use std::future::Future;
use std::io;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, oneshot};

use crate::source::ItemStream;
use crate::tokenize;

use super::collector::{CollectTarget, Collector};
use super::process::{BoxReader, EchoProcess, Launcher, ProcessHandle, Signal, TokioLauncher};
use super::wiring::{self, Feed, OutputControl, Target};
use super::{
    CommandLine, InputMode, Program, StdioConfig, XargsError, XargsEvent, XargsOptions,
    DEFAULT_COMMAND,
};

/// Create a channel that collects arguments and spawns `command` with them.
///
/// # Errors
///
/// Returns `XargsError::Tokenize` if the command line cannot be parsed.
pub fn xargs(
    command: impl Into<CommandLine>,
    options: XargsOptions,
) -> Result<XargsChannel, XargsError> {
    XargsChannel::new(command, options)
}

/// Create a channel that spawns `command` right away, without collecting
/// arguments. Data piped into the channel becomes the child's stdin.
///
/// The process starts on the driver's first turn. Its stdin is only piped
/// when a source was attached with [`XargsChannel::pipe_from`] before that
/// turn; a source attached later is ignored because stdin is already null.
/// On a multi-thread runtime the driver can run before the caller attaches,
/// so either use a current-thread runtime or pass an explicit `stdio` with a
/// piped stdin.
///
/// # Errors
///
/// Returns `XargsError::Tokenize` if the command line cannot be parsed.
pub fn spawn(
    command: impl Into<CommandLine>,
    options: XargsOptions,
) -> Result<XargsChannel, XargsError> {
    XargsChannel::new(command, options.disabled())
}

pub(crate) enum Request {
    Write(Vec<u8>),
    End,
    Attach(ItemStream),
    Pipe(Target),
    Unpipe,
    Kill(Signal),
    TakeStderr(oneshot::Sender<Option<BoxReader>>),
    Id(oneshot::Sender<Option<u32>>),
}

/// Duplex bridge between item streams and a subprocess.
///
/// Items written in are collected as arguments (or buffered as stdin),
/// the process is spawned exactly once, and its output is piped to the
/// downstream target.
#[derive(Debug)]
pub struct XargsChannel {
    command: String,
    requests: mpsc::UnboundedSender<Request>,
    events: mpsc::UnboundedReceiver<XargsEvent>,
    ended: AtomicBool,
}

impl XargsChannel {
    /// Create a channel that launches real processes.
    ///
    /// Must be called from within a tokio runtime. With input disabled the
    /// process is spawned on the driver's first turn, so attach any upstream
    /// source before yielding to the runtime; a current-thread runtime makes
    /// that ordering deterministic.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Tokenize` if the command line cannot be parsed.
    pub fn new(
        command: impl Into<CommandLine>,
        options: XargsOptions,
    ) -> Result<Self, XargsError> {
        Self::with_launcher(command, options, Arc::new(TokioLauncher))
    }

    /// Create a channel that launches processes through `launcher`.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Tokenize` if the command line cannot be parsed.
    pub fn with_launcher(
        command: impl Into<CommandLine>,
        options: XargsOptions,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self, XargsError> {
        let program = command.into().resolve(options.default_command.as_deref())?;
        let command = program.name().to_string();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = Driver::new(program, options, launcher, events_tx);
        tokio::spawn(driver.run(requests_rx));

        Ok(Self {
            command,
            requests: requests_tx,
            events: events_rx,
            ended: AtomicBool::new(false),
        })
    }

    /// The resolved executable.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Write one item into the channel.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::WriteAfterEnd` once [`end`](Self::end) was called.
    pub fn write(&self, item: impl Into<Vec<u8>>) -> Result<(), XargsError> {
        if self.ended.load(Ordering::Acquire) {
            return Err(XargsError::WriteAfterEnd);
        }
        self.send(Request::Write(item.into()))
    }

    /// Signal that no more items will be written.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Closed` if the driver is gone.
    pub fn end(&self) -> Result<(), XargsError> {
        if self.ended.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.send(Request::End)
    }

    /// Attach an upstream source. Its items are handled like written items
    /// and its end completes the writer. Only the first source is used.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Closed` if the driver is gone.
    pub fn pipe_from(&self, source: ItemStream) -> Result<(), XargsError> {
        self.send(Request::Attach(source))
    }

    /// Pipe the process output into `target`.
    ///
    /// The target is registered immediately. The returned future resolves
    /// with the target once the output is drained and the target shut down,
    /// or once [`unpipe`](Self::unpipe) detaches it.
    pub fn pipe<W>(&self, target: W) -> impl Future<Output = Result<W, XargsError>> + Send + 'static
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (done, released) = oneshot::channel();
        let sent = self.send(Request::Pipe(Target::new(Box::new(target), done)));

        async move {
            sent?;
            let writer = released.await.map_err(|_| XargsError::Closed)??;
            writer
                .into_any()
                .downcast::<W>()
                .map(|writer| *writer)
                .map_err(|_| XargsError::TargetMismatch)
        }
    }

    /// Detach the downstream target.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Closed` if the driver is gone.
    pub fn unpipe(&self) -> Result<(), XargsError> {
        self.send(Request::Unpipe)
    }

    /// Send `signal` to the process, or queue it until the process exists.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Closed` if the driver is gone.
    pub fn kill(&self, signal: Signal) -> Result<(), XargsError> {
        self.send(Request::Kill(signal))
    }

    /// Send `SIGTERM`.
    ///
    /// # Errors
    ///
    /// Returns `XargsError::Closed` if the driver is gone.
    pub fn terminate(&self) -> Result<(), XargsError> {
        self.kill(Signal::SIGTERM)
    }

    /// The process ID, once spawned and while running.
    pub async fn id(&self) -> Option<u32> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Id(reply)).ok()?;
        rx.await.ok().flatten()
    }

    /// Take the process stderr, if spawned with a piped stderr.
    pub async fn take_stderr(&self) -> Option<BoxReader> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::TakeStderr(reply)).ok()?;
        rx.await.ok().flatten()
    }

    /// Receive the next lifecycle event.
    pub async fn next_event(&mut self) -> Option<XargsEvent> {
        self.events.recv().await
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns the spawn or wait error if the process failed.
    pub async fn wait(&mut self) -> Result<ExitStatus, XargsError> {
        while let Some(event) = self.next_event().await {
            match event {
                XargsEvent::Exit(status) => return Ok(status),
                XargsEvent::Error(e) => return Err(e),
                XargsEvent::Close => {}
            }
        }
        Err(XargsError::Closed)
    }

    fn send(&self, request: Request) -> Result<(), XargsError> {
        self.requests.send(request).map_err(|_| XargsError::Closed)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Write(_) => "Write",
            Self::End => "End",
            Self::Attach(_) => "Attach",
            Self::Pipe(_) => "Pipe",
            Self::Unpipe => "Unpipe",
            Self::Kill(_) => "Kill",
            Self::TakeStderr(_) => "TakeStderr",
            Self::Id(_) => "Id",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Upstream,
    Disabled,
    External,
}

/// Owns every piece of channel state.
struct Driver {
    launcher: Arc<dyn Launcher>,
    command: String,
    /// Leading arguments; moved out and frozen at spawn.
    argv: Vec<String>,
    /// Print the arguments instead of launching a process.
    echo: bool,
    stdio: Option<StdioConfig>,
    mode: Mode,
    collector: Collector,
    events: mpsc::UnboundedSender<XargsEvent>,
    external: Option<ItemStream>,
    upstream: Option<ItemStream>,
    upstream_attached: bool,
    target: Option<Target>,
    /// `None` once spawn was attempted.
    queued_signals: Option<Vec<Signal>>,
    process: Option<Box<dyn ProcessHandle>>,
    input: Option<mpsc::UnboundedSender<Feed>>,
    output: Option<mpsc::UnboundedSender<OutputControl>>,
    has_output: bool,
    stderr: Option<BoxReader>,
    spawned: bool,
    ended: bool,
    exited: bool,
}

impl Driver {
    fn new(
        program: Program,
        options: XargsOptions,
        launcher: Arc<dyn Launcher>,
        events: mpsc::UnboundedSender<XargsEvent>,
    ) -> Self {
        let (command, argv, echo) = match program {
            Program::Echo => (DEFAULT_COMMAND.to_string(), Vec::new(), true),
            Program::Exec { command, args } => (command, args, false),
        };
        let (mode, external) = match options.input {
            InputMode::Upstream => (Mode::Upstream, None),
            InputMode::Disabled => (Mode::Disabled, None),
            InputMode::External(source) => (Mode::External, Some(source)),
        };
        let collect = if mode == Mode::External {
            CollectTarget::Buffer
        } else {
            CollectTarget::Arguments
        };

        Self {
            launcher,
            command,
            argv,
            echo,
            stdio: options.stdio,
            mode,
            collector: Collector::new(collect),
            events,
            external,
            upstream: None,
            upstream_attached: false,
            target: None,
            queued_signals: Some(Vec::new()),
            process: None,
            input: None,
            output: None,
            has_output: false,
            stderr: None,
            spawned: false,
            ended: false,
            exited: false,
        }
    }

    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        tracing::debug!(command = %self.command, mode = ?self.mode, "Xargs channel started");

        if self.mode == Mode::Disabled {
            // Spawn on the first turn, after everything queued before it.
            while let Ok(request) = requests.try_recv() {
                self.handle(request);
            }
            self.spawn();
        }

        let mut requests_open = true;
        loop {
            let read_upstream =
                !self.spawned && self.mode != Mode::Disabled && self.upstream.is_some();
            let read_external = self.external.is_some();
            let running = self.process.is_some() && !self.exited;

            tokio::select! {
                request = requests.recv(), if requests_open => match request {
                    Some(request) => self.handle(request),
                    None => {
                        requests_open = false;
                        tracing::debug!("Channel handle dropped, ending input");
                        self.stderr = None;
                        self.finish();
                    }
                },
                item = next_item(&mut self.upstream), if read_upstream => {
                    self.on_upstream_item(item);
                }
                item = next_item(&mut self.external), if read_external => {
                    self.on_external_item(item);
                }
                status = wait_process(&mut self.process), if running => {
                    self.on_exit(status);
                }
                else => break,
            }
        }

        tracing::debug!(command = %self.command, "Xargs channel finished");
    }

    fn handle(&mut self, request: Request) {
        tracing::trace!(?request, "Handling request");
        match request {
            Request::Write(item) => self.collect(item),
            Request::End => self.finish(),
            Request::Attach(source) => self.attach_upstream(source),
            Request::Pipe(target) => self.pipe(target),
            Request::Unpipe => self.unpipe(),
            Request::Kill(signal) => self.kill(signal),
            Request::TakeStderr(reply) => {
                let _ = reply.send(self.stderr.take());
            }
            Request::Id(reply) => {
                let id = if self.exited {
                    None
                } else {
                    self.process.as_ref().and_then(|p| p.id())
                };
                let _ = reply.send(id);
            }
        }
    }

    fn collect(&mut self, item: Vec<u8>) {
        if !self.spawned {
            self.collector.push(item);
            return;
        }

        match (self.mode, &self.input) {
            (Mode::Upstream, _) => {
                tracing::warn!(bytes = item.len(), "Dropping item written after spawn");
            }
            (_, Some(input)) => {
                let _ = input.send(Feed::Chunk(item));
            }
            (_, None) => {
                tracing::debug!(bytes = item.len(), "Process input closed, dropping item");
            }
        }
    }

    fn on_upstream_item(&mut self, item: Option<io::Result<Vec<u8>>>) {
        match item {
            Some(Ok(item)) => self.collect(item),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Upstream source failed, treating as end of input");
                self.upstream = None;
                self.finish();
            }
            None => {
                tracing::trace!("Upstream source ended");
                self.upstream = None;
                self.finish();
            }
        }
    }

    fn on_external_item(&mut self, item: Option<io::Result<Vec<u8>>>) {
        match item {
            Some(Ok(item)) => self.collector.push_arg(&item),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "External input failed, spawning with arguments so far");
                self.external = None;
                self.spawn();
            }
            None => {
                tracing::trace!(args = self.collector.args().len(), "External input ended");
                self.external = None;
                self.spawn();
            }
        }
    }

    /// The writer is done. Spawns in upstream mode once the attached source
    /// (if any) is drained; closes the process input after spawn.
    fn finish(&mut self) {
        self.ended = true;

        if self.spawned {
            self.close_input();
        } else if self.mode == Mode::Upstream && self.upstream.is_none() {
            self.spawn();
        }
    }

    fn close_input(&mut self) {
        if let Some(input) = self.input.take() {
            let _ = input.send(Feed::Close);
        }
    }

    fn attach_upstream(&mut self, source: ItemStream) {
        if self.upstream_attached {
            tracing::warn!("Upstream source already attached, ignoring");
            return;
        }
        self.upstream_attached = true;

        if !self.spawned {
            self.upstream = Some(source);
            return;
        }

        match &self.input {
            Some(input) => {
                let _ = input.send(Feed::Source(source));
            }
            None => tracing::debug!("Process input closed, ignoring upstream source"),
        }
    }

    fn pipe(&mut self, target: Target) {
        if let Some(output) = &self.output {
            if let Err(SendError(OutputControl::Attach(target))) =
                output.send(OutputControl::Attach(target))
            {
                // Output already drained.
                tokio::spawn(target.finish());
            }
            return;
        }

        if self.spawned {
            tokio::spawn(target.finish());
            return;
        }

        if let Some(previous) = self.target.replace(target) {
            previous.release();
        }
    }

    fn unpipe(&mut self) {
        if let Some(output) = &self.output {
            let _ = output.send(OutputControl::Detach);
        } else if let Some(target) = self.target.take() {
            target.release();
        }
    }

    fn kill(&mut self, signal: Signal) {
        if let Some(process) = self.process.as_mut() {
            if self.exited {
                tracing::debug!(?signal, "Process already exited, ignoring signal");
            } else if let Err(e) = process.signal(signal) {
                tracing::warn!(?signal, error = %e, "Failed to signal process");
            }
        } else if let Some(queue) = self.queued_signals.as_mut() {
            tracing::debug!(?signal, "Queueing signal until spawn");
            queue.push(signal);
        } else {
            tracing::debug!(?signal, "Process never started, ignoring signal");
        }
    }

    /// Launch the process. Runs at most once.
    fn spawn(&mut self) {
        if self.spawned {
            return;
        }
        self.spawned = true;

        let (collected, buffered) = self.collector.drain();
        let mut args = std::mem::take(&mut self.argv);
        args.extend(collected);

        let discard_stdin = self.mode == Mode::Disabled && self.upstream.is_none();
        let stdio = self
            .stdio
            .unwrap_or_else(|| StdioConfig::resolve_default(discard_stdin));
        let queued = self.queued_signals.take().unwrap_or_default();

        let launched = if self.echo {
            tracing::info!(args = args.len(), "Echoing collected arguments");
            Ok(Box::new(EchoProcess::new(&args)) as Box<dyn ProcessHandle>)
        } else {
            tracing::info!(
                command = %tokenize::display(&self.command, &args),
                stdin = ?stdio.stdin,
                "Spawning process"
            );
            self.launcher.launch(&self.command, &args, &stdio)
        };

        let mut process = match launched {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(command = %self.command, error = %e, "Failed to spawn process");
                if !queued.is_empty() {
                    tracing::debug!(count = queued.len(), "Discarding queued signals");
                }
                self.upstream = None;
                if let Some(target) = self.target.take() {
                    tokio::spawn(target.finish());
                }
                let _ = self.events.send(XargsEvent::Error(XargsError::Spawn(e)));
                return;
            }
        };

        for signal in queued {
            tracing::debug!(?signal, "Delivering queued signal");
            if let Err(e) = process.signal(signal) {
                tracing::warn!(?signal, error = %e, "Failed to signal process");
            }
        }

        if let Some(stdin) = process.take_stdin() {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(wiring::feed_input(stdin, rx));

            for chunk in buffered {
                let _ = tx.send(Feed::Chunk(chunk));
            }
            if let Some(source) = self.upstream.take() {
                let _ = tx.send(Feed::Source(source));
            }
            self.input = Some(tx);

            if self.ended {
                self.close_input();
            }
        } else if !buffered.is_empty() || self.upstream.is_some() {
            tracing::warn!(
                chunks = buffered.len(),
                "Process has no input channel, discarding buffered input"
            );
            self.upstream = None;
        }

        if let Some(stdout) = process.take_stdout() {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(wiring::forward_output(stdout, rx, self.events.clone()));

            if let Some(target) = self.target.take() {
                let _ = tx.send(OutputControl::Attach(target));
            }
            self.output = Some(tx);
            self.has_output = true;
        } else if let Some(target) = self.target.take() {
            tokio::spawn(target.finish());
        }

        self.stderr = process.take_stderr();
        self.process = Some(process);
    }

    fn on_exit(&mut self, status: io::Result<ExitStatus>) {
        self.exited = true;

        match status {
            Ok(status) => {
                tracing::info!(command = %self.command, %status, "Process exited");
                let _ = self.events.send(XargsEvent::Exit(status));
                if !self.has_output {
                    let _ = self.events.send(XargsEvent::Close);
                }
            }
            Err(e) => {
                tracing::error!(command = %self.command, error = %e, "Failed to wait for process");
                let _ = self.events.send(XargsEvent::Error(XargsError::Wait(e)));
            }
        }
    }
}

async fn next_item(source: &mut Option<ItemStream>) -> Option<io::Result<Vec<u8>>> {
    match source {
        Some(source) => source.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_process(process: &mut Option<Box<dyn ProcessHandle>>) -> io::Result<ExitStatus> {
    match process {
        Some(process) => process.wait().await,
        None => std::future::pending().await,
    }
}
