use std::time::Duration;

use bitflags::bitflags;

use super::HeartRateValue;

bitflags! {
    /// First byte of a Heart Rate Measurement (0x2A37) payload.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct MeasurementFlags: u8 {
        const VALUE_U16 = 1 << 0;
        const SENSOR_CONTACT_DETECTED = 1 << 1;
        const SENSOR_CONTACT_SUPPORTED = 1 << 2;
        const ENERGY_EXPENDED_PRESENT = 1 << 3;
        const RR_INTERVALS_PRESENT = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SensorContact {
    #[default]
    NotSupported,
    NotDetected,
    Detected,
}

impl From<MeasurementFlags> for SensorContact {
    fn from(flags: MeasurementFlags) -> Self {
        if !flags.contains(MeasurementFlags::SENSOR_CONTACT_SUPPORTED) {
            SensorContact::NotSupported
        } else if flags.contains(MeasurementFlags::SENSOR_CONTACT_DETECTED) {
            SensorContact::Detected
        } else {
            SensorContact::NotDetected
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartRateMeasurement {
    pub bpm: HeartRateValue,
    pub flags: MeasurementFlags,
    pub sensor_contact: SensorContact,
    /// Cumulative, in kilojoules
    pub energy_expended: Option<u16>,
    pub rr_intervals: Vec<Duration>,
}

/// RR intervals are sent in 1/1024ths of a second.
const RR_UNITS_PER_SEC: f64 = 1024.0;

/// Pulls the heart rate out of a raw Heart Rate Measurement payload.
///
/// Returns `None` when the payload can't hold the value its flags declare:
/// empty, only a flags byte, or a 16-bit value cut down to a single byte.
/// A truncated 16-bit value is never reinterpreted as an 8-bit one.
///
/// Only the first three bytes are ever looked at, everything after the
/// heart rate field is ignored.
pub fn decode(bytes: &[u8]) -> Option<HeartRateValue> {
    let flags = MeasurementFlags::from_bits_retain(*bytes.first()?);

    if flags.contains(MeasurementFlags::VALUE_U16) {
        match bytes.get(1..3)? {
            [low, high] => Some(u16::from_le_bytes([*low, *high])),
            _ => None,
        }
    } else {
        bytes.get(1).map(|&value| HeartRateValue::from(value))
    }
}

/// Like [`decode`], but also reads the optional fields that follow
/// the heart rate.
///
/// Returns `None` in exactly the same cases as [`decode`]. Missing or short
/// optional fields don't fail the parse, they're just left out.
pub fn parse_measurement(bytes: &[u8]) -> Option<HeartRateMeasurement> {
    let bpm = decode(bytes)?;
    let flags = MeasurementFlags::from_bits_retain(bytes[0]);

    let mut offset = if flags.contains(MeasurementFlags::VALUE_U16) {
        3
    } else {
        2
    };

    let mut energy_expended = None;
    let mut rr_intervals = Vec::new();

    if flags.contains(MeasurementFlags::ENERGY_EXPENDED_PRESENT) {
        energy_expended = read_u16_le(bytes, offset);
        offset += 2;
    }

    // If energy was flagged but cut off, we can't trust where RR starts
    let rr_offset_known = !flags.contains(MeasurementFlags::ENERGY_EXPENDED_PRESENT)
        || energy_expended.is_some();

    if flags.contains(MeasurementFlags::RR_INTERVALS_PRESENT) && rr_offset_known {
        rr_intervals = bytes
            .get(offset..)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|pair| rr_from_raw(u16::from_le_bytes([pair[0], pair[1]])))
            .collect();
    }

    Some(HeartRateMeasurement {
        bpm,
        flags,
        sensor_contact: flags.into(),
        energy_expended,
        rr_intervals,
    })
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    match bytes.get(offset..offset + 2)? {
        [low, high] => Some(u16::from_le_bytes([*low, *high])),
        _ => None,
    }
}

fn rr_from_raw(raw: u16) -> Duration {
    Duration::from_secs_f64(f64::from(raw) / RR_UNITS_PER_SEC)
}

/// Inverse of the RR conversion, used when building frames ourselves.
pub fn rr_to_raw(rr: Duration) -> u16 {
    (rr.as_secs_f64() * RR_UNITS_PER_SEC)
        .round()
        .clamp(0.0, u16::MAX as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload() {
        assert_eq!(decode(&[]), None);
        assert_eq!(parse_measurement(&[]), None);
    }

    #[test]
    fn flags_only() {
        assert_eq!(decode(&[0x00]), None);
        assert_eq!(decode(&[0x01]), None);
    }

    #[test]
    fn eight_bit_value() {
        assert_eq!(decode(&[0x00, 72]), Some(72));
        assert_eq!(decode(&[0x00, 0xFF]), Some(255));
        assert_eq!(decode(&[0x00, 0]), Some(0));
    }

    #[test]
    fn sixteen_bit_value() {
        assert_eq!(decode(&[0x01, 72, 0]), Some(72));
        assert_eq!(decode(&[0x01, 0xFF, 0x01]), Some(511));
        assert_eq!(decode(&[0x01, 0xFF, 0xFF]), Some(u16::MAX));
    }

    #[test]
    fn truncated_sixteen_bit_does_not_fall_back() {
        assert_eq!(decode(&[0x01, 72]), None);
        assert_eq!(parse_measurement(&[0x01, 72]), None);
    }

    #[test]
    fn other_flag_bits_ignored() {
        // Contact + energy + RR flagged, trailing data present or not
        assert_eq!(decode(&[0b0001_1110, 64]), Some(64));
        assert_eq!(decode(&[0b0001_1110, 64, 0x10, 0x00, 0x00, 0x04]), Some(64));
        assert_eq!(decode(&[0b1111_1111, 0x2C, 0x01, 0xAA]), Some(300));
        assert_eq!(decode(&[0b1111_1110, 0x2C, 0x01, 0xAA]), Some(0x2C));
    }

    #[test]
    fn bytes_past_the_value_are_ignored() {
        assert_eq!(decode(&[0x00, 90, 1, 2, 3, 4, 5, 6, 7]), Some(90));
        assert_eq!(decode(&[0x01, 90, 0, 1, 2, 3]), Some(90));
    }

    #[test]
    fn full_measurement() {
        // 16-bit HR, contact supported + detected, energy present, two RR intervals
        let bytes = [
            0b0001_1111,
            80,
            0,
            0x34,
            0x12,
            0x00,
            0x04, // 1024/1024 = 1s
            0x00,
            0x02, // 512/1024 = 0.5s
        ];
        let measurement = parse_measurement(&bytes).unwrap();
        assert_eq!(measurement.bpm, 80);
        assert_eq!(measurement.sensor_contact, SensorContact::Detected);
        assert_eq!(measurement.energy_expended, Some(0x1234));
        assert_eq!(
            measurement.rr_intervals,
            vec![Duration::from_secs(1), Duration::from_millis(500)]
        );
    }

    #[test]
    fn rr_without_energy() {
        let bytes = [0b0001_0000, 60, 0x00, 0x04, 0x01];
        let measurement = parse_measurement(&bytes).unwrap();
        assert_eq!(measurement.bpm, 60);
        assert_eq!(measurement.energy_expended, None);
        assert_eq!(measurement.sensor_contact, SensorContact::NotSupported);
        // Trailing odd byte dropped
        assert_eq!(measurement.rr_intervals, vec![Duration::from_secs(1)]);
    }

    #[test]
    fn truncated_energy_skips_rr() {
        let bytes = [0b0001_1000, 60, 0x10];
        let measurement = parse_measurement(&bytes).unwrap();
        assert_eq!(measurement.bpm, 60);
        assert_eq!(measurement.energy_expended, None);
        assert!(measurement.rr_intervals.is_empty());
    }

    #[test]
    fn contact_not_detected() {
        let measurement = parse_measurement(&[0b0000_0100, 70]).unwrap();
        assert_eq!(measurement.sensor_contact, SensorContact::NotDetected);
    }

    #[test]
    fn parse_agrees_with_decode() {
        let payloads: [&[u8]; 8] = [
            &[],
            &[0x00],
            &[0x01],
            &[0x01, 72],
            &[0x00, 72],
            &[0x01, 72, 1],
            &[0x18, 72, 1],
            &[0x19, 72, 1, 2, 3, 4, 5],
        ];
        for payload in payloads {
            assert_eq!(
                decode(payload),
                parse_measurement(payload).map(|m| m.bpm),
                "payload: {payload:?}"
            );
        }
    }

    #[test]
    fn rr_raw_conversion() {
        assert_eq!(rr_to_raw(Duration::from_secs(1)), 1024);
        assert_eq!(rr_to_raw(Duration::from_millis(500)), 512);
        assert_eq!(rr_from_raw(rr_to_raw(Duration::from_millis(750))), Duration::from_millis(750));
    }
}
