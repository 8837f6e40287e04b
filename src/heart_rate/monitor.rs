use std::num::NonZeroUsize;

use chrono::{DateTime, Local};
use tracing::{debug, trace};

use super::history::HistoryBuffer;
use super::measurement::decode;
use super::HeartRateValue;

/// What presentation layers get after every successfully decoded sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartRateUpdate {
    pub bpm: HeartRateValue,
    /// Oldest first
    pub history: Vec<HeartRateValue>,
    pub timestamp: DateTime<Local>,
}

/// Glue between a transport and the decoder/history.
///
/// Transports hand over raw characteristic bytes with [`on_sample`](Self::on_sample),
/// regardless of whether they came from a notification or a poll.
#[derive(Debug, Default)]
pub struct HeartRateMonitor {
    history: HistoryBuffer,
    latest: Option<HeartRateValue>,
    dropped_samples: u64,
}

impl HeartRateMonitor {
    pub fn new(history_capacity: NonZeroUsize) -> Self {
        Self {
            history: HistoryBuffer::new(history_capacity),
            latest: None,
            dropped_samples: 0,
        }
    }

    /// Decodes `bytes` and records the result.
    ///
    /// Malformed payloads return `None` and change nothing besides the
    /// dropped sample counter.
    pub fn on_sample(&mut self, bytes: &[u8]) -> Option<HeartRateUpdate> {
        let Some(bpm) = decode(bytes) else {
            self.dropped_samples += 1;
            debug!(
                "Dropping malformed HR payload {:02X?} ({} dropped so far)",
                bytes, self.dropped_samples
            );
            return None;
        };
        trace!("Decoded {bpm} BPM from {bytes:02X?}");

        self.history.append(bpm);
        self.latest = Some(bpm);

        Some(HeartRateUpdate {
            bpm,
            history: self.history.snapshot(),
            timestamp: Local::now(),
        })
    }

    pub fn on_disconnect(&mut self) {
        debug!("Clearing {} history entries", self.history.len());
        self.history.reset();
        self.latest = None;
    }

    pub fn latest(&self) -> Option<HeartRateValue> {
        self.latest
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}
