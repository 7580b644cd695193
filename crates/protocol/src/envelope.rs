use serde::{Deserialize, Serialize};

use crate::types::{ProgressEvent, TransferOutcome};
use crate::{PROGRESS_EVENT, RESULT_EVENT};

/// Errors produced while encoding or decoding event envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected event: expected {expected}, got {actual}")]
    UnexpectedEvent { expected: String, actual: String },
}

/// Named event forwarded to an observer.
///
/// The `payload` field uses `serde_json::value::RawValue` so an observer
/// can route on `event` before deciding how to decode the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub payload: Box<serde_json::value::RawValue>,
}

impl EventEnvelope {
    /// Wraps a serializable payload under the given event name.
    pub fn new<T: Serialize>(event: impl Into<String>, payload: &T) -> Result<Self, ProtocolError> {
        let json = serde_json::to_string(payload)?;
        Ok(Self {
            event: event.into(),
            payload: serde_json::value::RawValue::from_string(json)?,
        })
    }

    /// Envelope for a progress notification.
    pub fn progress(event: &ProgressEvent) -> Result<Self, ProtocolError> {
        Self::new(PROGRESS_EVENT, event)
    }

    /// Envelope for a terminal outcome of `peripheral`'s session.
    pub fn result(peripheral: &str, outcome: &TransferOutcome) -> Result<Self, ProtocolError> {
        #[derive(Serialize)]
        struct ResultBody<'a> {
            peripheral: &'a str,
            #[serde(flatten)]
            outcome: &'a TransferOutcome,
        }
        Self::new(
            RESULT_EVENT,
            &ResultBody {
                peripheral,
                outcome,
            },
        )
    }

    /// Deserializes the payload, checking that the event name matches.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
        expected: &str,
    ) -> Result<T, ProtocolError> {
        if self.event != expected {
            return Err(ProtocolError::UnexpectedEvent {
                expected: expected.into(),
                actual: self.event.clone(),
            });
        }
        Ok(serde_json::from_str(self.payload.get())?)
    }

    /// Serializes the envelope as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
