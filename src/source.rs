//! Item streams that feed an xargs channel.
//!
//! An item is a chunk of bytes. Whether a chunk is treated as one argument
//! or as raw stdin payload depends on the channel's input mode, so the same
//! adapters serve both purposes.

use std::io;
use std::pin::Pin;

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::ReaderStream;

/// A boxed stream of byte items.
pub type ItemStream = Pin<Box<dyn Stream<Item = io::Result<Vec<u8>>> + Send>>;

/// Stream a fixed sequence of items.
pub fn from_items<I, T>(items: I) -> ItemStream
where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Into<Vec<u8>> + 'static,
{
    futures_util::stream::iter(items.into_iter().map(|item| Ok(item.into()))).boxed()
}

/// Stream a single chunk of bytes.
pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> ItemStream {
    futures_util::stream::once(std::future::ready(Ok(bytes.into()))).boxed()
}

/// Stream each line of a reader as one item, without its terminator.
pub fn lines<R>(reader: R) -> ItemStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    LinesStream::new(BufReader::new(reader).lines())
        .map(|line| line.map(String::into_bytes))
        .boxed()
}

/// Stream every whitespace-separated word of a reader as one item.
pub fn words<R>(reader: R) -> ItemStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    LinesStream::new(BufReader::new(reader).lines())
        .flat_map(|line| {
            let items: Vec<io::Result<Vec<u8>>> = match line {
                Ok(line) => line
                    .split_whitespace()
                    .map(|word| Ok(word.as_bytes().to_vec()))
                    .collect(),
                Err(e) => vec![Err(e)],
            };
            futures_util::stream::iter(items)
        })
        .boxed()
}

/// Stream a reader's raw bytes in arbitrary chunks.
pub fn chunks<R>(reader: R) -> ItemStream
where
    R: AsyncRead + Send + 'static,
{
    ReaderStream::new(reader)
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed()
}
