//! Scripted in-memory connection for engine tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::connection::{BoxFuture, Connection};

/// What the next `read` call does.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReadStep {
    Data(usize),
    Eof,
    Fail,
    Pending,
}

/// Everything the mock observed, shared with the test.
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub writes: Vec<Vec<u8>>,
    pub write_attempts: usize,
    pub reads: usize,
    pub close_calls: usize,
    pub closed: bool,
    pub writes_after_close: usize,
}

impl MockState {
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

pub(crate) struct MockConnection {
    chunk_size: usize,
    state: Arc<Mutex<MockState>>,
    script: VecDeque<ReadStep>,
    auto_ack: bool,
    fail_write_at: Option<usize>,
}

impl MockConnection {
    /// A connection that acknowledges every read immediately.
    pub fn new(chunk_size: usize) -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let conn = Self {
            chunk_size,
            state: Arc::clone(&state),
            script: VecDeque::new(),
            auto_ack: true,
            fail_write_at: None,
        };
        (conn, state)
    }

    /// Plays `steps` before falling back to the default read behavior.
    pub fn with_script(mut self, steps: impl IntoIterator<Item = ReadStep>) -> Self {
        self.script.extend(steps);
        self
    }

    /// Reads that are not scripted never complete.
    pub fn silent(mut self) -> Self {
        self.auto_ack = false;
        self
    }

    /// Fails the write with this zero-based index.
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }
}

impl Connection for MockConnection {
    fn max_chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            let mut s = self.state.lock().unwrap();
            s.write_attempts += 1;
            if s.closed {
                s.writes_after_close += 1;
            }
            if self.fail_write_at == Some(s.writes.len()) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
            }
            s.writes.push(buf.to_vec());
            Ok(())
        })
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            self.state.lock().unwrap().reads += 1;
            let fallback = if self.auto_ack {
                ReadStep::Data(1)
            } else {
                ReadStep::Pending
            };
            match self.script.pop_front().unwrap_or(fallback) {
                ReadStep::Data(n) => Ok(n.min(buf.len())),
                ReadStep::Eof => Ok(0),
                ReadStep::Fail => Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "mock read failure",
                )),
                ReadStep::Pending => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let mut s = self.state.lock().unwrap();
            s.close_calls += 1;
            s.closed = true;
            Ok(())
        })
    }

    fn peer(&self) -> String {
        "mock".into()
    }
}
