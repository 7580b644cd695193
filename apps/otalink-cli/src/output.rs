//! JSON event lines on stdout.
//!
//! Each line is an [`EventEnvelope`]: progress events while the transfer
//! runs, then one result event.

use std::io::Write;

use otalink_protocol::{EventEnvelope, ProgressEvent, ProtocolError, TransferOutcome};
use tokio::sync::mpsc;

pub fn progress_line(event: &ProgressEvent) -> Result<String, ProtocolError> {
    EventEnvelope::progress(event)?.to_json_line()
}

pub fn result_line(peripheral: &str, outcome: &TransferOutcome) -> Result<String, ProtocolError> {
    EventEnvelope::result(peripheral, outcome)?.to_json_line()
}

/// Prints every progress event until the sending side is dropped.
pub async fn print_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> anyhow::Result<()> {
    while let Some(event) = rx.recv().await {
        emit(&progress_line(&event)?)?;
    }
    Ok(())
}

pub fn emit(line: &str) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}
