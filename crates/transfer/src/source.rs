use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::TransferError;

/// A fully-buffered, immutable payload.
///
/// The engine only ever asks for the whole byte sequence; how it got into
/// memory is the implementor's business.
pub trait ByteSource: Send + Sync {
    /// The complete payload.
    fn as_bytes(&self) -> &[u8];

    /// Total payload length in bytes.
    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload already held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    data: Arc<[u8]>,
}

impl InMemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for InMemorySource {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl ByteSource for Box<dyn ByteSource> {
    fn as_bytes(&self) -> &[u8] {
        (**self).as_bytes()
    }
}

impl ByteSource for &'static [u8] {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

/// Payload loaded from a firmware image on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    data: Vec<u8>,
}

impl FileSource {
    /// Reads the whole file at `path` into memory.
    pub async fn load(path: &Path) -> Result<Self, TransferError> {
        let data = tokio::fs::read(path).await?;
        info!(path = %path.display(), len = data.len(), "firmware image loaded");
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Path the image was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
