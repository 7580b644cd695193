//! In-process link over [`tokio::io::duplex`].

use std::io;

use otalink_transfer::{BoxFuture, Connection};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// A [`Connection`] whose peer is the other end of an in-memory pipe.
///
/// Useful for running the engine against [`receive_stream`](crate::receive_stream)
/// without sockets.
pub struct MemoryLink {
    stream: DuplexStream,
    chunk_size: usize,
    closed: bool,
}

impl MemoryLink {
    /// Creates a link and the stream its peer talks through. `buffer` is
    /// the pipe capacity in each direction.
    pub fn pair(chunk_size: usize, buffer: usize) -> (Self, DuplexStream) {
        let (local, remote) = tokio::io::duplex(buffer);
        let link = Self {
            stream: local,
            chunk_size,
            closed: false,
        };
        (link, remote)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.shutdown().await
    }
}

impl Connection for MemoryLink {
    fn max_chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            if self.closed {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
            }
            self.stream.write_all(buf).await
        })
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move { self.stream.read(buf).await })
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.shutdown())
    }

    fn peer(&self) -> String {
        "memory".into()
    }
}
