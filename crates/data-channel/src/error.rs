//! Error types for the data channel.

/// Errors produced by the TCP link.
#[derive(Debug, thiserror::Error)]
pub enum DataChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(
        "packet size {max_packet_size} leaves no payload room after {header_allowance} header bytes"
    )]
    PacketTooSmall {
        max_packet_size: u16,
        header_allowance: usize,
    },
}
