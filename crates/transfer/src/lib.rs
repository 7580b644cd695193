//! Chunked firmware transfer over a packet-size-limited connection.
//!
//! The [`TransferEngine`] writes a fully-buffered payload to a
//! [`Connection`] in bursts of chunks. Each burst is triggered by a read
//! signal from the peer and bounded by a progress watermark, so the
//! sender never runs far ahead of what the receiver is draining.
//! Progress goes to a [`ProgressSink`]; the terminal outcome goes to a
//! [`CompletionCallback`] exactly once.

mod connection;
mod engine;
mod progress;
mod session;
mod source;
mod validation;

#[cfg(test)]
mod mock;

use otalink_protocol::FailureKind;

pub use connection::{BoxFuture, Connection, ConnectionFactory, SetupError};
pub use engine::{
    CancelHandle, CompletionCallback, Payload, TransferConfig, TransferEngine, execute,
};
pub use progress::{
    COARSE_STRIDE, FINE_GRAINED_LIMIT, PROGRESS_STEP, ProgressCallback, ProgressSink,
    progress_percent,
};
pub use session::TransferSession;
pub use source::{ByteSource, FileSource, InMemorySource};
pub use validation::{validate_chunk_size, validate_payload};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection setup failed: {0}")]
    ConnectionSetup(String),

    #[error("payload is empty")]
    DegenerateInput,

    #[error("transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),

    #[error("transport read failed: {0}")]
    TransportRead(#[source] std::io::Error),

    #[error("peer closed the stream before the transfer completed")]
    PeerClosed,

    #[error("cancelled")]
    Cancelled,
}

impl TransferError {
    /// Coarse category reported to the caller for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::ConnectionSetup(_) => FailureKind::Setup,
            Self::Io(_) | Self::DegenerateInput => FailureKind::InvalidPayload,
            Self::TransportWrite(_) | Self::TransportRead(_) | Self::PeerClosed => {
                FailureKind::Transport
            }
            Self::Cancelled => FailureKind::Cancelled,
        }
    }
}
