use std::sync::Arc;

use otalink_protocol::ProgressEvent;
use tokio::sync::mpsc;

/// Watermark increase, in percentage points, granted by each peer signal.
pub const PROGRESS_STEP: u32 = 4;

/// Below this offset progress is reported at full granularity.
pub const FINE_GRAINED_LIMIT: usize = 1024;

/// Past [`FINE_GRAINED_LIMIT`], progress only moves in strides of this many bytes.
pub const COARSE_STRIDE: usize = 512;

/// Computes the progress percentage for `offset` bytes sent out of `total`.
///
/// Inside the first kilobyte the value is `offset * 100 / total`. Past it,
/// the bytes beyond the first kilobyte are rounded down to a multiple of
/// [`COARSE_STRIDE`] before scaling, which bounds the number of distinct
/// values a large payload can produce. Division floors.
///
/// Returns 0 for an empty payload.
pub fn progress_percent(offset: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let offset = offset.min(total) as u64;
    let total = total as u64;

    let counted = if offset < FINE_GRAINED_LIMIT as u64 {
        offset
    } else {
        let stride = COARSE_STRIDE as u64;
        (offset - FINE_GRAINED_LIMIT as u64) / stride * stride
    };
    (counted * 100 / total) as u8
}

/// Receives progress notifications. Fire-and-forget: implementations must
/// not block the engine.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, session_id: &str, percent: u8);
}

/// Callback invoked with `(session_id, percent)`.
pub type ProgressCallback = Box<dyn Fn(&str, u8) + Send + Sync>;

impl ProgressSink for ProgressCallback {
    fn notify(&self, session_id: &str, percent: u8) {
        (self)(session_id, percent)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn notify(&self, session_id: &str, percent: u8) {
        (**self).notify(session_id, percent)
    }
}

impl ProgressSink for mpsc::Sender<ProgressEvent> {
    fn notify(&self, session_id: &str, percent: u8) {
        // Drop the update if the observer is slow or gone.
        let _ = self.try_send(ProgressEvent {
            peripheral: session_id.to_string(),
            progress: percent,
        });
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn notify(&self, session_id: &str, percent: u8) {
        let _ = self.send(ProgressEvent {
            peripheral: session_id.to_string(),
            progress: percent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fine_grained_below_first_kilobyte() {
        assert_eq!(progress_percent(0, 100), 0);
        assert_eq!(progress_percent(50, 100), 50);
        assert_eq!(progress_percent(100, 100), 100);
        assert_eq!(progress_percent(200, 2000), 10);
        assert_eq!(progress_percent(1000, 2000), 50);
        assert_eq!(progress_percent(1023, 1023), 100);
    }

    #[test]
    fn coarse_past_first_kilobyte() {
        // (1200 - 1024) / 512 * 512 = 0
        assert_eq!(progress_percent(1200, 2000), 0);
        assert_eq!(progress_percent(1400, 2000), 0);
        // (1600 - 1024) / 512 * 512 = 512; 512 * 100 / 2000 = 25
        assert_eq!(progress_percent(1600, 2000), 25);
        assert_eq!(progress_percent(2000, 2000), 25);
    }

    #[test]
    fn floors_uneven_totals() {
        // 1 * 100 / 3 = 33
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 66);
    }

    #[test]
    fn large_payload_does_not_overflow() {
        let total = 64 * 1024 * 1024;
        let p = progress_percent(total, total);
        assert!(p <= 100);
        assert_eq!(p, 99);
    }

    #[test]
    fn bounded_for_every_offset() {
        let total = 5000;
        for offset in 0..=total {
            assert!(progress_percent(offset, total) <= 100);
        }
    }

    #[test]
    fn empty_payload_reports_zero() {
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn callback_sink_receives_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sink: ProgressCallback = Box::new(move |id: &str, p: u8| {
            s.lock().unwrap().push((id.to_string(), p));
        });
        sink.notify("dev", 10);
        sink.notify("dev", 20);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("dev".to_string(), 10), ("dev".to_string(), 20)]
        );
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(1);
        tx.notify("dev", 1);
        tx.notify("dev", 2);
        let first = rx.try_recv().unwrap();
        assert_eq!(first.progress, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<ProgressEvent>();
        drop(rx);
        // Should not panic.
        tx.notify("dev", 50);
    }
}
