//! Stream wiring between the channel and a live process.
//!
//! ```text
//!   buffered chunks ─┐
//!   upstream source ─┼─▶ feed_input ─▶ child stdin
//!   live writes ─────┘
//!
//!   child stdout ─▶ forward_output ─▶ downstream target
//! ```
//!
//! Each side runs as its own task so a child blocked on a full stdout pipe
//! can never deadlock against a pending stdin write.

use std::any::Any;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use crate::source::ItemStream;

use super::{XargsError, XargsEvent};

/// Size of a single read from the child's stdout.
const OUTPUT_CHUNK_SIZE: usize = 8 * 1024;

/// Writer that can be handed back to its owner with its concrete type.
pub(crate) trait Downstream: AsyncWrite + Send + Unpin + 'static {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> Downstream for T
where
    T: AsyncWrite + Send + Unpin + 'static,
{
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub(crate) type Released = Result<Box<dyn Downstream>, XargsError>;

/// A downstream target together with the slot its owner waits on.
pub(crate) struct Target {
    writer: Box<dyn Downstream>,
    done: oneshot::Sender<Released>,
}

impl Target {
    pub(crate) fn new(writer: Box<dyn Downstream>, done: oneshot::Sender<Released>) -> Self {
        Self { writer, done }
    }

    /// Hand the target back without closing it.
    pub(crate) fn release(self) {
        let _ = self.done.send(Ok(self.writer));
    }

    /// Shut the target down, then hand it back.
    pub(crate) async fn finish(mut self) {
        let result = match self.writer.shutdown().await {
            Ok(()) => Ok(self.writer),
            Err(e) => Err(XargsError::Output(e)),
        };
        let _ = self.done.send(result);
    }

    fn fail(self, err: std::io::Error) {
        let _ = self.done.send(Err(XargsError::Output(err)));
    }
}

/// What the stdin feeder writes next.
pub(crate) enum Feed {
    /// A single chunk.
    Chunk(Vec<u8>),
    /// Every item of a stream; its end closes stdin.
    Source(ItemStream),
    /// Close stdin.
    Close,
}

/// Write feeds into the child's stdin, strictly in the order received.
pub(crate) async fn feed_input<W>(stdin: W, mut feeds: mpsc::UnboundedReceiver<Feed>)
where
    W: AsyncWrite + Unpin,
{
    let mut stdin = Some(stdin);

    while let Some(feed) = feeds.recv().await {
        let Some(writer) = stdin.as_mut() else {
            tracing::debug!("Process input closed, dropping data");
            continue;
        };

        let keep_open = match feed {
            Feed::Chunk(chunk) => write_chunk(writer, &chunk).await,
            Feed::Source(source) => {
                splice(writer, source).await;
                false
            }
            Feed::Close => false,
        };

        if !keep_open {
            if let Some(mut writer) = stdin.take() {
                let _ = writer.shutdown().await;
                tracing::trace!("Process input closed");
            }
        }
    }
}

async fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> bool
where
    W: AsyncWrite + Unpin,
{
    match writer.write_all(chunk).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::debug!("Process closed its input");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to write to process input");
            false
        }
    }
}

async fn splice<W>(writer: &mut W, mut source: ItemStream)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = source.next().await {
        match item {
            Ok(chunk) => {
                if !write_chunk(writer, &chunk).await {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream source failed, closing process input");
                return;
            }
        }
    }
}

/// Control messages for the stdout forwarder.
pub(crate) enum OutputControl {
    Attach(Target),
    Detach,
}

/// Copy the child's stdout into whichever target is attached.
///
/// Nothing is read while no target is attached. `Close` is emitted once the
/// output reaches end of stream.
pub(crate) async fn forward_output<R>(
    mut stdout: R,
    mut control: mpsc::UnboundedReceiver<OutputControl>,
    events: mpsc::UnboundedSender<XargsEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut target: Option<Target> = None;
    let mut control_open = true;
    let mut buf = vec![0u8; OUTPUT_CHUNK_SIZE];

    loop {
        tokio::select! {
            biased;

            message = control.recv(), if control_open => match message {
                Some(OutputControl::Attach(next)) => {
                    if let Some(previous) = target.replace(next) {
                        previous.release();
                    }
                }
                Some(OutputControl::Detach) => {
                    if let Some(previous) = target.take() {
                        previous.release();
                    }
                }
                None => control_open = false,
            },
            read = stdout.read(&mut buf), if target.is_some() => match read {
                Ok(0) => {
                    if let Some(current) = target.take() {
                        current.finish().await;
                    }
                    let _ = events.send(XargsEvent::Close);
                    return;
                }
                Ok(n) => {
                    let Some(current) = target.as_mut() else {
                        continue;
                    };
                    if let Err(e) = current.writer.write_all(&buf[..n]).await {
                        tracing::warn!(error = %e, "Failed to write to downstream target");
                        if let Some(current) = target.take() {
                            current.fail(e);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read process output");
                    if let Some(current) = target.take() {
                        current.fail(e);
                    }
                    let _ = events.send(XargsEvent::Close);
                    return;
                }
            },
            else => return,
        }
    }
}
