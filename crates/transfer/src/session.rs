use otalink_protocol::TransferStatus;

use crate::progress::{PROGRESS_STEP, progress_percent};
use crate::source::ByteSource;
use crate::validation::{validate_chunk_size, validate_payload};
use crate::TransferError;

/// Mutable state of one transfer, owned by a single running engine.
///
/// Bytes `[0, offset)` have been handed to the connection. `remaining` is
/// `None` until the first chunk has been written, and `total - offset`
/// afterwards.
pub struct TransferSession {
    id: String,
    source: Box<dyn ByteSource>,
    total: usize,
    offset: usize,
    remaining: Option<usize>,
    chunk_size: usize,
    progress_threshold: u32,
    reported: u8,
    status: TransferStatus,
    bursts: u32,
    chunks_written: u64,
}

impl TransferSession {
    /// Creates a pending session for `source`, written in chunks of at
    /// most `chunk_size` bytes.
    ///
    /// Rejects an empty payload and a zero chunk size.
    pub fn new(
        id: impl Into<String>,
        source: Box<dyn ByteSource>,
        chunk_size: usize,
    ) -> Result<Self, TransferError> {
        validate_payload(&*source)?;
        validate_chunk_size(chunk_size)?;
        let total = source.len();
        Ok(Self {
            id: id.into(),
            source,
            total,
            offset: 0,
            remaining: None,
            chunk_size,
            progress_threshold: 0,
            reported: 0,
            status: TransferStatus::Pending,
            bursts: 0,
            chunks_written: 0,
        })
    }

    /// Raises the progress watermark for a new burst and returns it.
    pub fn begin_burst(&mut self) -> u32 {
        self.bursts += 1;
        self.progress_threshold += PROGRESS_STEP;
        self.progress_threshold
    }

    /// The next chunk to write: `min(chunk_size, total - offset)` bytes
    /// starting at `offset`. Empty once the payload is exhausted.
    pub fn next_block(&self) -> &[u8] {
        let size = self.chunk_size.min(self.total - self.offset);
        &self.source.as_bytes()[self.offset..self.offset + size]
    }

    /// Records that `written` bytes were handed to the connection and
    /// returns the progress percentage at the new offset.
    pub fn advance(&mut self, written: usize) -> u8 {
        debug_assert!(written <= self.total - self.offset);
        self.offset = (self.offset + written).min(self.total);
        self.remaining = Some(self.total - self.offset);
        self.chunks_written += 1;
        progress_percent(self.offset, self.total)
    }

    /// Converts a computed percentage into the value reported to observers.
    ///
    /// Reported values never decrease, and the write that exhausts the
    /// payload reports 100.
    pub fn record_progress(&mut self, computed: u8) -> u8 {
        let value = if self.offset == self.total {
            100
        } else {
            computed.max(self.reported)
        };
        self.reported = value;
        value
    }

    pub fn set_status(&mut self, status: TransferStatus) {
        self.status = status;
    }

    /// Returns `true` once every byte has been written.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to write, or `None` before the first chunk.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn progress_threshold(&self) -> u32 {
        self.progress_threshold
    }

    /// Highest percentage reported so far.
    pub fn reported(&self) -> u8 {
        self.reported
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Number of bursts started so far.
    pub fn bursts(&self) -> u32 {
        self.bursts
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }
}
