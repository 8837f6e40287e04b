pub mod ble;
pub mod dummy;
pub mod history;
pub mod measurement;
pub mod monitor;

use std::time::Duration;

use uuid::Uuid;

pub use history::HistoryBuffer;
pub use measurement::{decode, parse_measurement, HeartRateMeasurement};
pub use monitor::{HeartRateMonitor, HeartRateUpdate};

/// Beats per minute, as reported by the monitor. Not clamped or sanity checked.
pub type HeartRateValue = u16;

pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

// Only used when we need to make up RR intervals
// (the dummy source)
pub fn rr_from_bpm(bpm: HeartRateValue) -> Duration {
    // Make sure it's at least 1 to prevent a potential divide by zero
    let bpm = bpm.max(1);
    Duration::from_secs_f32(60.0 / bpm as f32)
}

/// Everything a transport is allowed to tell the app.
/// Bytes are passed along untouched, decoding happens in [`HeartRateMonitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Carries a display name for the device
    Connected(String),
    Sample(Vec<u8>),
    Disconnected,
}
