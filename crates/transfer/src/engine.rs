//! Burst-driven transfer engine.
//!
//! The engine writes one burst of chunks when it starts, then waits for
//! the peer to produce inbound data. Every arrival authorizes another
//! burst; the content of the inbound data is not interpreted. Each burst
//! raises a progress watermark by [`PROGRESS_STEP`](crate::PROGRESS_STEP)
//! points and keeps writing until the computed progress reaches it, the
//! payload is exhausted, or cancellation is observed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use otalink_protocol::{FailureKind, TransferOutcome, TransferStatus};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, ConnectionFactory};
use crate::progress::ProgressSink;
use crate::session::TransferSession;
use crate::source::{ByteSource, FileSource, InMemorySource};
use crate::validation::validate_payload;
use crate::TransferError;

/// Receives the terminal outcome of a transfer. Invoked exactly once.
pub type CompletionCallback = Box<dyn FnOnce(TransferOutcome) + Send>;

/// Default pause before the connection is closed, letting transport
/// buffers flush.
const DEFAULT_CLOSE_GRACE_MS: u64 = 300;

/// Default size of the buffer that receives peer signals.
const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Tunables for a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Pause before closing the connection, in milliseconds.
    pub close_grace_ms: u64,
    /// Size of the buffer used to receive peer signals.
    pub read_buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            close_grace_ms: DEFAULT_CLOSE_GRACE_MS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Cooperative cancellation for a running transfer.
///
/// Cheap to clone; every clone controls the same transfer.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The engine stops at the next chunk boundary
    /// and never interrupts a write in flight.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl From<CancellationToken> for CancelHandle {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}

/// Drives one payload through one connection.
pub struct TransferEngine {
    session: TransferSession,
    conn: Option<Box<dyn Connection>>,
    sink: Arc<dyn ProgressSink>,
    completion: Option<CompletionCallback>,
    /// Outcome decided but not yet delivered while the connection is released.
    pending: Option<TransferOutcome>,
    cancel: CancellationToken,
    config: TransferConfig,
}

impl TransferEngine {
    /// Binds a payload, a connection, a progress sink and a completion
    /// callback into a ready-to-start engine.
    ///
    /// Fails on an empty payload or a connection without a usable chunk
    /// size. In that case `completion` has already been invoked with the
    /// failure and the connection dropped, so the caller sees the same
    /// single terminal notification as for a failure after start.
    pub fn new(
        session_id: impl Into<String>,
        source: impl ByteSource + 'static,
        conn: Box<dyn Connection>,
        sink: impl ProgressSink + 'static,
        completion: CompletionCallback,
    ) -> Result<Self, TransferError> {
        let session_id = session_id.into();
        let session = match TransferSession::new(
            session_id.clone(),
            Box::new(source),
            conn.max_chunk_size(),
        ) {
            Ok(s) => s,
            Err(e) => {
                error!(session = %session_id, peer = %conn.peer(), error = %e, "transfer rejected");
                completion(TransferOutcome::failed(e.failure_kind()));
                return Err(e);
            }
        };

        debug!(
            session = %session_id,
            peer = %conn.peer(),
            total = session.total(),
            chunk_size = session.chunk_size(),
            "transfer engine created"
        );

        Ok(Self {
            session,
            conn: Some(conn),
            sink: Arc::new(sink),
            completion: Some(completion),
            pending: None,
            cancel: CancellationToken::new(),
            config: TransferConfig::default(),
        })
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares cancellation with `handle`.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle.token;
        self
    }

    /// Returns a handle that cancels this transfer.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::from(self.cancel.clone())
    }

    /// Sets the cooperative cancellation flag.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Runs the transfer to its terminal outcome.
    ///
    /// Sends the initial burst, then alternates between waiting for a peer
    /// signal and sending further bursts. The outcome is delivered through
    /// the completion callback; the connection is released on every path.
    pub async fn start(mut self) {
        info!(
            session = %self.session.id(),
            total = self.session.total(),
            chunk_size = self.session.chunk_size(),
            "transfer started"
        );
        self.session.set_status(TransferStatus::InProgress);

        match self.on_peer_signal(0).await {
            Ok(true) => self.read_loop().await,
            Ok(false) | Err(_) => {}
        }
    }

    /// Runs [`start`](Self::start) on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.start())
    }

    /// Handles one peer signal by sending a burst.
    ///
    /// Returns `Ok(true)` while the caller should keep waiting for signals
    /// and `Ok(false)` once the transfer has completed. On `Err` the session
    /// has already been terminated and the failure reported.
    pub async fn on_peer_signal(&mut self, ack_hint: usize) -> Result<bool, TransferError> {
        if self.completion.is_none() {
            return Ok(false);
        }
        if let Some(outcome) = self.pending.clone() {
            self.finish(outcome).await;
            return Ok(false);
        }
        debug!(session = %self.session.id(), ack_hint, "peer signal");

        if self.session.is_exhausted() {
            self.finish(TransferOutcome::success()).await;
            return Ok(false);
        }

        let threshold = self.session.begin_burst();
        let mut progress = 0u8;

        while u32::from(progress) < threshold && !self.cancel.is_cancelled() {
            let Some(conn) = self.conn.as_mut() else {
                break;
            };

            let block = self.session.next_block();
            let size = block.len();
            debug!(offset = self.session.offset(), size, "writing chunk");

            if let Err(e) = conn.write(block).await {
                let err = TransferError::TransportWrite(e);
                self.fail(&err).await;
                return Err(err);
            }

            progress = self.session.advance(size);
            let reported = self.session.record_progress(progress);
            self.sink.notify(self.session.id(), reported);

            if self.session.is_exhausted() {
                info!(session = %self.session.id(), total = self.session.total(), "data load complete");
                break;
            }
        }

        debug!(
            session = %self.session.id(),
            threshold,
            progress,
            offset = self.session.offset(),
            "burst finished"
        );
        Ok(true)
    }

    async fn read_loop(&mut self) {
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            if self.cancel.is_cancelled() {
                self.fail(&TransferError::Cancelled).await;
                return;
            }

            let signal = {
                let cancel = &self.cancel;
                let Some(conn) = self.conn.as_mut() else {
                    return;
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = conn.read(&mut buf) => Some(result),
                }
            };

            let count = match signal {
                None => {
                    self.fail(&TransferError::Cancelled).await;
                    return;
                }
                Some(Err(e)) => {
                    self.fail(&TransferError::TransportRead(e)).await;
                    return;
                }
                Some(Ok(0)) => {
                    self.fail(&TransferError::PeerClosed).await;
                    return;
                }
                Some(Ok(n)) => n,
            };

            match self.on_peer_signal(count).await {
                Ok(true) => {}
                Ok(false) | Err(_) => return,
            }
        }
    }

    async fn fail(&mut self, err: &TransferError) {
        match err {
            TransferError::Cancelled => {
                warn!(session = %self.session.id(), offset = self.session.offset(), "transfer cancelled");
            }
            _ => {
                error!(
                    session = %self.session.id(),
                    offset = self.session.offset(),
                    error = %err,
                    "transfer failed"
                );
            }
        }
        self.finish(TransferOutcome::failed(err.failure_kind())).await;
    }

    /// Releases the connection and reports `outcome`. Runs at most once.
    ///
    /// The first outcome decided wins. It stays in `pending` until the
    /// callback runs, so dropping the engine mid-release still delivers it.
    async fn finish(&mut self, outcome: TransferOutcome) {
        if self.completion.is_none() {
            return;
        }
        let outcome = self.pending.get_or_insert(outcome).clone();
        self.session.set_status(outcome.status());
        self.release().await;

        if outcome.is_success() {
            info!(
                session = %self.session.id(),
                total = self.session.total(),
                bursts = self.session.bursts(),
                chunks = self.session.chunks_written(),
                "transfer completed"
            );
        }
        self.pending = None;
        if let Some(completion) = self.completion.take() {
            completion(outcome);
        }
    }

    async fn release(&mut self) {
        if self.conn.is_none() {
            return;
        }
        tokio::time::sleep(self.config.close_grace()).await;
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if let Err(e) = conn.close().await {
            warn!(peer = %conn.peer(), error = %e, "failed to close connection");
        }
        debug!(peer = %conn.peer(), "connection released");
    }
}

impl Drop for TransferEngine {
    fn drop(&mut self) {
        // Dropped before the outcome was delivered, e.g. its task was aborted.
        if let Some(completion) = self.completion.take() {
            let outcome = self
                .pending
                .take()
                .unwrap_or_else(|| TransferOutcome::failed(FailureKind::Cancelled));
            warn!(session = %self.session.id(), ?outcome, "transfer dropped before completion");
            completion(outcome);
        }
    }
}

/// Where the payload of an [`execute`] call comes from.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Bytes already in memory.
    Bytes(Arc<[u8]>),
    /// A firmware image on disk, loaded before connecting.
    File(PathBuf),
}

impl Payload {
    async fn load(self) -> Result<Box<dyn ByteSource>, TransferError> {
        match self {
            Payload::Bytes(data) => Ok(Box::new(InMemorySource::new(data))),
            Payload::File(path) => Ok(Box::new(FileSource::load(&path).await?)),
        }
    }
}

/// Loads the payload, opens a connection through `factory` and runs the
/// transfer to completion.
///
/// Every failure, including those before the first byte is sent, is
/// reported through `completion`, which is invoked exactly once.
pub async fn execute(
    session_id: impl Into<String>,
    payload: Payload,
    factory: &dyn ConnectionFactory,
    sink: impl ProgressSink + 'static,
    completion: CompletionCallback,
    cancel: CancelHandle,
    config: TransferConfig,
) {
    let session_id = session_id.into();

    let source = match payload.load().await {
        Ok(s) => s,
        Err(e) => {
            error!(session = %session_id, error = %e, "failed to load payload");
            completion(TransferOutcome::failed(e.failure_kind()));
            return;
        }
    };
    if let Err(e) = validate_payload(&*source) {
        error!(session = %session_id, error = %e, "transfer rejected");
        completion(TransferOutcome::failed(e.failure_kind()));
        return;
    }

    let connected = tokio::select! {
        biased;
        _ = cancel.token.cancelled() => Err(TransferError::Cancelled),
        result = factory.connect() => {
            result.map_err(|e| TransferError::ConnectionSetup(e.to_string()))
        }
    };
    let conn = match connected {
        Ok(c) => c,
        Err(e) => {
            error!(session = %session_id, error = %e, "connection setup failed");
            completion(TransferOutcome::failed(e.failure_kind()));
            return;
        }
    };
    info!(session = %session_id, peer = %conn.peer(), chunk_size = conn.max_chunk_size(), "connected");

    // On error `new` has already reported the failure.
    if let Ok(engine) = TransferEngine::new(session_id, source, conn, sink, completion) {
        engine
            .with_config(config)
            .with_cancel_handle(cancel)
            .start()
            .await;
    }
}
