//! Transport contracts the engine depends on.
//!
//! The engine never opens connections itself. A [`ConnectionFactory`]
//! chosen by the caller produces a [`Connection`] whose chunk size is
//! already known.

use std::future::Future;
use std::io;
use std::pin::Pin;

/// Boxed, sendable future used by the object-safe transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error returned by a [`ConnectionFactory`].
pub type SetupError = Box<dyn std::error::Error + Send + Sync>;

/// A bidirectional, packet-size-limited byte channel.
pub trait Connection: Send {
    /// Largest payload slice a single [`write`](Self::write) may carry.
    ///
    /// Any per-packet header allowance has already been subtracted.
    fn max_chunk_size(&self) -> usize;

    /// Writes the whole of `buf` as one transport operation.
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;

    /// Waits for inbound data, returning how many bytes were read.
    ///
    /// Returns `Ok(0)` at end of stream.
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>>;

    /// Releases the connection. Calling it more than once is a no-op.
    fn close(&mut self) -> BoxFuture<'_, io::Result<()>>;

    /// Human-readable identifier of the remote end, for logging.
    fn peer(&self) -> String;
}

/// Strategy for establishing a [`Connection`].
pub trait ConnectionFactory: Send + Sync {
    /// Opens a connection and discovers its chunk size.
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, SetupError>>;
}
