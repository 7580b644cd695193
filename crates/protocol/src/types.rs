use serde::{Deserialize, Serialize};

use crate::{FAILURE_MESSAGE, SUCCESS_MESSAGE};

/// Lifecycle state of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl TransferStatus {
    /// Returns `true` once the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Coarse failure category reported to the caller.
///
/// Observers only need to know that a transfer failed; the category exists
/// so a UI can pick a wording. Detailed causes go to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The connection could not be opened or its chunk size is unknown.
    Setup,
    /// The payload was empty or could not be loaded.
    InvalidPayload,
    /// A write or read on the connection failed, or the peer went away.
    Transport,
    /// The transfer was cancelled before it completed.
    Cancelled,
}

/// Terminal outcome of a transfer. Delivered exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Success { message: String },
    Failed { kind: FailureKind, message: String },
}

impl TransferOutcome {
    /// The successful outcome.
    pub fn success() -> Self {
        Self::Success {
            message: SUCCESS_MESSAGE.into(),
        }
    }

    /// A failed outcome carrying the generic failure message.
    pub fn failed(kind: FailureKind) -> Self {
        Self::Failed {
            kind,
            message: FAILURE_MESSAGE.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Session status implied by this outcome.
    pub fn status(&self) -> TransferStatus {
        match self {
            Self::Success { .. } => TransferStatus::Completed,
            Self::Failed {
                kind: FailureKind::Cancelled,
                ..
            } => TransferStatus::Cancelled,
            Self::Failed { .. } => TransferStatus::Failed,
        }
    }
}

/// Progress notification for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Identifier of the receiving peripheral (the session id).
    pub peripheral: String,
    /// Percentage in `0..=100`.
    pub progress: u8,
}
