//! TCP wire format for firmware transfers.
//!
//! # Wire format
//!
//! ```text
//! LINK PARAMS (Receiver -> Sender, negotiated links only, right after accept):
//!   [2 bytes BE: max transmit packet size]
//!
//! PAYLOAD (Sender -> Receiver):  raw firmware bytes, unframed
//! ACK (Receiver -> Sender):      [1 byte: 0x06] after every read
//! END:                           sender shuts down its write half
//! ```
//!
//! The sender never interprets ack contents; any inbound byte is a signal.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DataChannelError;

/// Byte written by the receiver after each read.
pub const ACK: u8 = 0x06;

/// Link parameters announced by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Largest packet the link can carry, headers included.
    pub max_packet_size: u16,
}

/// Writes the link parameters to the stream.
pub async fn write_link_params<W: AsyncWrite + Unpin>(
    writer: &mut W,
    params: &LinkParams,
) -> Result<(), DataChannelError> {
    if params.max_packet_size == 0 {
        return Err(DataChannelError::Protocol(
            "max packet size must be non-zero".into(),
        ));
    }
    writer.write_u16(params.max_packet_size).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the link parameters from the stream.
pub async fn read_link_params<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<LinkParams, DataChannelError> {
    let max_packet_size = reader.read_u16().await?;
    Ok(LinkParams { max_packet_size })
}

/// Writes a single flow-control acknowledgement.
pub async fn write_ack<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), DataChannelError> {
    writer.write_u8(ACK).await?;
    writer.flush().await?;
    Ok(())
}
