//! TCP link for firmware transfers.
//!
//! Provides a connection-oriented, packet-size-limited transport for the
//! transfer engine: [`TcpConnector`] opens links on the sending side and
//! [`OtaReceiver`] plays the device, acknowledging every read so the
//! sender keeps bursting.
//!
//! # Wire format
//!
//! See [`wire`] module for the handshake.

pub mod client;
pub mod error;
pub mod memory;
pub mod server;
pub mod wire;

pub use client::{LinkConfig, LinkStrategy, TcpConnector, TcpLink, chunk_size_for};
pub use error::DataChannelError;
pub use memory::MemoryLink;
pub use server::{OtaReceiver, receive_stream};
pub use wire::LinkParams;

use std::time::Duration;

/// Receiver read buffer size (64 KB).
pub const TCP_BUFFER_SIZE: usize = 64 * 1024;

/// Timeout for the TCP connection attempt.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for reading the link parameters after connecting.
pub const TCP_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a closing link waits for the peer to finish reading.
pub const TCP_CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes of every packet reserved for link-layer headers.
pub const DEFAULT_HEADER_ALLOWANCE: usize = 3;
