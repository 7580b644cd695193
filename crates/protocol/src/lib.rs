//! Event and outcome types for otalink firmware transfers.
//!
//! These are the values that cross the boundary between the transfer
//! engine and whatever observes it (a UI bridge, a CLI printing JSON
//! lines, a test harness).

pub mod envelope;
pub mod types;

pub use envelope::{EventEnvelope, ProtocolError};
pub use types::{FailureKind, ProgressEvent, TransferOutcome, TransferStatus};

/// Event name used when forwarding progress to an observer.
pub const PROGRESS_EVENT: &str = "L2capDownloadProgress";

/// Event name used when forwarding the terminal outcome to an observer.
pub const RESULT_EVENT: &str = "L2capDownloadResult";

/// Message attached to a successful outcome.
pub const SUCCESS_MESSAGE: &str = "success";

/// Generic message attached to every failed outcome.
pub const FAILURE_MESSAGE: &str = "ota failed";
