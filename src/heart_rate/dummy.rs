use super::measurement::{rr_to_raw, MeasurementFlags};
use super::{rr_from_bpm, HeartRateValue, SourceEvent};
use crate::settings::DummySettings;

use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DUMMY_DEVICE_NAME: &str = "Dummy HRM";

/// Builds raw Heart Rate Measurement payloads that sweep between the
/// configured BPM bounds, the same way a real strap would send them.
pub struct DummyFrames {
    low_bpm: HeartRateValue,
    high_bpm: HeartRateValue,
    loops_before_dc: u16,
    malformed_every: u16,

    bpm: HeartRateValue,
    positive_direction: bool,
    loops: u16,
    frame_count: u64,
    reconnect_pending: bool,
}

impl DummyFrames {
    pub fn new(dummy_settings: &DummySettings) -> Self {
        Self {
            low_bpm: dummy_settings.low_bpm,
            high_bpm: dummy_settings.high_bpm,
            loops_before_dc: dummy_settings.loops_before_dc,
            malformed_every: dummy_settings.malformed_every,
            bpm: dummy_settings.low_bpm.saturating_sub(1),
            positive_direction: true,
            loops: 0,
            frame_count: 0,
            reconnect_pending: false,
        }
    }

    pub fn next_event(&mut self) -> SourceEvent {
        if self.reconnect_pending {
            self.reconnect_pending = false;
            return SourceEvent::Connected(DUMMY_DEVICE_NAME.into());
        }

        let bound = if self.positive_direction {
            self.bpm += 1;
            self.high_bpm
        } else {
            self.bpm -= 1;
            self.low_bpm
        };
        if self.bpm == bound {
            self.positive_direction = !self.positive_direction;
            self.loops += 1;
            if self.loops_before_dc != 0 && self.loops >= self.loops_before_dc {
                self.loops = 0;
                self.reconnect_pending = true;
                return SourceEvent::Disconnected;
            }
        }

        self.frame_count += 1;
        if self.malformed_every != 0 && self.frame_count % u64::from(self.malformed_every) == 0 {
            // Claims a 16-bit value but only carries one byte of it
            return SourceEvent::Sample(vec![MeasurementFlags::VALUE_U16.bits(), self.bpm as u8]);
        }

        SourceEvent::Sample(self.build_frame())
    }

    fn build_frame(&self) -> Vec<u8> {
        let mut flags = MeasurementFlags::SENSOR_CONTACT_SUPPORTED
            | MeasurementFlags::SENSOR_CONTACT_DETECTED
            | MeasurementFlags::RR_INTERVALS_PRESENT;
        // Alternate between encodings so both paths get exercised
        let use_u16 = self.frame_count % 2 == 0 || self.bpm > u8::MAX as HeartRateValue;
        if use_u16 {
            flags |= MeasurementFlags::VALUE_U16;
        }

        let mut frame = vec![flags.bits()];
        if use_u16 {
            frame.extend_from_slice(&self.bpm.to_le_bytes());
        } else {
            frame.push(self.bpm as u8);
        }
        frame.extend_from_slice(&rr_to_raw(rr_from_bpm(self.bpm)).to_le_bytes());
        frame
    }
}

pub async fn dummy_thread(
    source_tx: Sender<SourceEvent>,
    dummy_settings: DummySettings,
    cancel_token: CancellationToken,
) {
    let bpm_update_per_sec = Duration::from_secs_f32(1.0 / (dummy_settings.bpm_speed));
    let mut bpm_update_interval = time::interval(bpm_update_per_sec);
    let mut frames = DummyFrames::new(&dummy_settings);

    info!(
        "Dummy source sweeping {}..{} BPM",
        dummy_settings.low_bpm, dummy_settings.high_bpm
    );
    if source_tx
        .send(SourceEvent::Connected(DUMMY_DEVICE_NAME.into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            _ = bpm_update_interval.tick() => {
                let event = frames.next_event();
                if event == SourceEvent::Disconnected {
                    warn!("Simulating lost connection");
                }
                debug!("Dummy event: {:?}", event);
                if source_tx.send(event).await.is_err() {
                    info!("Dummy source receiver closed, stopping");
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Shutting down Dummy thread!");
                break;
            }
        }
    }
}
