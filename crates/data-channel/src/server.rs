//! Receiving peer (device side).
//!
//! Binds a listener, accepts a single connection, optionally announces its
//! packet size and stores the raw payload, acknowledging every read so the
//! sender keeps bursting.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DataChannelError;
use crate::wire::{LinkParams, write_ack, write_link_params};
use crate::{TCP_BUFFER_SIZE, TCP_CONNECT_TIMEOUT};

/// Emulates a device receiving a firmware image over one TCP connection.
pub struct OtaReceiver {
    listener: TcpListener,
    announce: Option<u16>,
    accept_timeout: Duration,
    cancel: CancellationToken,
}

impl OtaReceiver {
    /// Binds the listener.
    ///
    /// With `announce` set, the packet size is sent to the sender right
    /// after accepting, for senders using negotiated links.
    pub async fn bind(
        addr: SocketAddr,
        announce: Option<u16>,
        cancel: CancellationToken,
    ) -> Result<Self, DataChannelError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, ?announce, "OTA receiver listening");
        Ok(Self {
            listener,
            announce,
            accept_timeout: TCP_CONNECT_TIMEOUT,
            cancel,
        })
    }

    /// How long to wait for the sender to connect.
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DataChannelError> {
        Ok(self.listener.local_addr()?)
    }

    /// Receives one image into memory.
    pub async fn receive(self) -> Result<Vec<u8>, DataChannelError> {
        let mut out = Vec::new();
        self.receive_into(&mut out).await?;
        Ok(out)
    }

    /// Receives one image into the file at `path`, returning its size.
    pub async fn receive_to_file(self, path: &Path) -> Result<u64, DataChannelError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;
        let total = self.receive_into(&mut file).await?;
        file.sync_all().await?;
        info!(path = %path.display(), total, "image written");
        Ok(total)
    }

    async fn receive_into<W: AsyncWrite + Unpin>(
        self,
        out: &mut W,
    ) -> Result<u64, DataChannelError> {
        // Wait for connection with timeout + cancellation.
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = tokio::time::timeout(self.accept_timeout, self.listener.accept()) => {
                match result {
                    Ok(Ok((stream, addr))) => {
                        info!(%addr, "OTA sender connected");
                        stream
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => return Err(DataChannelError::Timeout),
                }
            }
        };

        // Only one connection per image.
        drop(self.listener);

        if let Some(max_packet_size) = self.announce {
            write_link_params(&mut stream, &LinkParams { max_packet_size }).await?;
        }

        receive_stream(stream, out, &self.cancel).await
    }
}

/// Reads raw payload bytes from `stream` into `out` until end-of-stream,
/// writing one ack per read. Returns the number of bytes received.
///
/// Ack write failures are ignored: the sender may stop reading once it has
/// everything it needs.
pub async fn receive_stream<S, W>(
    stream: S,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<u64, DataChannelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0u8; TCP_BUFFER_SIZE];
    let mut total: u64 = 0;
    let mut acks_ok = true;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = reader.read(&mut buf) => result?,
        };
        if n == 0 {
            debug!(total, "sender finished");
            break;
        }

        out.write_all(&buf[..n]).await?;
        total += n as u64;

        if acks_ok && let Err(e) = write_ack(&mut writer).await {
            warn!(error = %e, "failed to acknowledge read; continuing without acks");
            acks_ok = false;
        }
    }

    out.flush().await?;
    info!(total, "OTA image received");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ACK;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn receive_stream_acks_every_read() {
        let (mut sender, device) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(async move {
            let mut out = Vec::new();
            let total = receive_stream(device, &mut out, &cancel).await?;
            Ok::<_, DataChannelError>((total, out))
        });

        sender.write_all(b"first").await.unwrap();
        let mut ack = [0u8; 1];
        sender.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack[0], ACK);

        sender.write_all(b"second").await.unwrap();
        sender.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack[0], ACK);

        sender.shutdown().await.unwrap();
        let (total, out) = task.await.unwrap().unwrap();
        assert_eq!(total, 11);
        assert_eq!(out, b"firstsecond");
    }

    #[tokio::test]
    async fn receive_stream_through_small_buffer() {
        let (mut sender, device) = tokio::io::duplex(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(async move {
            let mut out = Vec::new();
            receive_stream(device, &mut out, &cancel).await.map(|_| out)
        });

        let (mut sender_rx, mut sender_tx) = tokio::io::split(&mut sender);
        let data = vec![0x5Au8; 10_000];
        let writer = async {
            sender_tx.write_all(&data).await.unwrap();
            sender_tx.shutdown().await.unwrap();
        };
        let reader = async {
            let mut acks = Vec::new();
            sender_rx.read_to_end(&mut acks).await.unwrap();
            acks
        };
        let ((), acks) = tokio::join!(writer, reader);

        let out = task.await.unwrap().unwrap();
        assert_eq!(out, data);
        assert!(!acks.is_empty());
        assert!(acks.iter().all(|&b| b == ACK));
    }

    #[tokio::test]
    async fn receiver_announces_packet_size() {
        let receiver = OtaReceiver::bind(localhost(), Some(251), CancellationToken::new())
            .await
            .unwrap();
        let addr = receiver.local_addr().unwrap();
        let server = tokio::spawn(receiver.receive());

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        assert_eq!(stream.read_u16().await.unwrap(), 251);
        stream.write_all(b"IMG").await.unwrap();
        assert_eq!(stream.read_u8().await.unwrap(), ACK);
        stream.shutdown().await.unwrap();

        assert_eq!(server.await.unwrap().unwrap(), b"IMG");
    }

    #[tokio::test]
    async fn receiver_cancellation() {
        let cancel = CancellationToken::new();
        let receiver = OtaReceiver::bind(localhost(), None, cancel.clone())
            .await
            .unwrap();

        // Cancel before anyone connects.
        cancel.cancel();

        let result = receiver.receive().await;
        assert!(matches!(result, Err(DataChannelError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn receiver_accept_timeout() {
        let receiver = OtaReceiver::bind(localhost(), None, CancellationToken::new())
            .await
            .unwrap()
            .with_accept_timeout(Duration::from_secs(1));

        let result = receiver.receive().await;
        assert!(matches!(result, Err(DataChannelError::Timeout)));
    }
}
