//! TCP link (sender side).
//!
//! Connects to the receiving peer, learns how large a packet may be and
//! hands the engine a [`Connection`] whose chunk size fits one packet.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use otalink_transfer::{BoxFuture, Connection, ConnectionFactory, SetupError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::error::DataChannelError;
use crate::wire::read_link_params;
use crate::{
    DEFAULT_HEADER_ALLOWANCE, TCP_CLOSE_DRAIN_TIMEOUT, TCP_CONNECT_TIMEOUT, TCP_HANDSHAKE_TIMEOUT,
};

/// How the sender learns the maximum packet size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// The packet size is known up front.
    Fixed { max_packet_size: u16 },
    /// The receiver announces its packet size right after accepting.
    Negotiated,
}

/// Parameters for opening a link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub addr: SocketAddr,
    pub strategy: LinkStrategy,
    /// Bytes of every packet reserved for link-layer headers.
    pub header_allowance: usize,
    pub connect_timeout: Duration,
}

impl LinkConfig {
    pub fn new(addr: SocketAddr, strategy: LinkStrategy) -> Self {
        Self {
            addr,
            strategy,
            header_allowance: DEFAULT_HEADER_ALLOWANCE,
            connect_timeout: TCP_CONNECT_TIMEOUT,
        }
    }
}

/// Payload bytes one packet can carry.
pub fn chunk_size_for(
    max_packet_size: u16,
    header_allowance: usize,
) -> Result<usize, DataChannelError> {
    match usize::from(max_packet_size).saturating_sub(header_allowance) {
        0 => Err(DataChannelError::PacketTooSmall {
            max_packet_size,
            header_allowance,
        }),
        n => Ok(n),
    }
}

/// Opens [`TcpLink`]s; the sender-side [`ConnectionFactory`].
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: LinkConfig,
}

impl TcpConnector {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Connects, runs the handshake the strategy needs and returns a link
    /// ready for payload bytes.
    pub async fn open(&self) -> Result<TcpLink, DataChannelError> {
        let addr = self.config.addr;

        // A fixed packet size can be checked before touching the network.
        if let LinkStrategy::Fixed { max_packet_size } = self.config.strategy {
            chunk_size_for(max_packet_size, self.config.header_allowance)?;
        }

        let mut stream =
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await
            {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(DataChannelError::Timeout),
            };
        stream.set_nodelay(true)?;
        info!(%addr, "TCP link connected");

        let max_packet_size = match self.config.strategy {
            LinkStrategy::Fixed { max_packet_size } => max_packet_size,
            LinkStrategy::Negotiated => {
                let params =
                    match tokio::time::timeout(TCP_HANDSHAKE_TIMEOUT, read_link_params(&mut stream))
                        .await
                    {
                        Ok(Ok(p)) => p,
                        Ok(Err(e)) => return Err(e),
                        Err(_) => return Err(DataChannelError::Timeout),
                    };
                debug!(%addr, max_packet_size = params.max_packet_size, "link parameters received");
                params.max_packet_size
            }
        };
        let chunk_size = chunk_size_for(max_packet_size, self.config.header_allowance)?;

        info!(%addr, max_packet_size, chunk_size, "TCP link ready");
        Ok(TcpLink::new(stream, addr, chunk_size))
    }
}

impl ConnectionFactory for TcpConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, SetupError>> {
        Box::pin(async move {
            match self.open().await {
                Ok(link) => Ok(Box::new(link) as Box<dyn Connection>),
                Err(e) => Err(Box::new(e) as SetupError),
            }
        })
    }
}

/// An open TCP link carrying at most `chunk_size` payload bytes per write.
pub struct TcpLink {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    chunk_size: usize,
    closed: bool,
}

impl TcpLink {
    fn new(stream: TcpStream, peer: SocketAddr, chunk_size: usize) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer,
            peer,
            chunk_size,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shuts down the write half, then waits for the peer to hang up so
    /// unread acks do not turn the close into a reset.
    async fn shutdown_and_drain(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.shutdown().await?;

        let mut buf = [0u8; 256];
        let reader = &mut self.reader;
        let drain = async {
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(TCP_CLOSE_DRAIN_TIMEOUT, drain)
            .await
            .is_err()
        {
            debug!(peer = %self.peer, "peer did not hang up before drain timeout");
        }
        Ok(())
    }
}

impl Connection for TcpLink {
    fn max_chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            if self.closed {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
            }
            self.writer.write_all(buf).await
        })
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move { self.reader.read(buf).await })
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.shutdown_and_drain())
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
