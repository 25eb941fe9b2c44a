//! Line-oriented wire protocol.
//!
//! The Arduino sketch prints one record per line:
//!
//! ```text
//! <full> <ir> <time_ms> <gain_code>
//! ```
//!
//! `full` and `ir` are raw TSL2591 counts, `time_ms` is `millis()` on the
//! board and `gain_code` is the gain register value (0, 16, 32 or 48).
//! The visible channel is not transmitted; it is `full - ir`.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SensorError};
use crate::gain::Gain;
use crate::stats::Channels;

const FIELD_COUNT: usize = 4;

/// One decoded frame before the gain is divided out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    pub full: i64,
    pub ir: i64,
    /// `full - ir`, checked for overflow when decoding.
    pub visible: i64,
    /// Board uptime in milliseconds.
    pub time_ms: i64,
    pub gain: Gain,
}

impl RawReading {
    #[inline]
    pub fn seconds(&self) -> f64 {
        self.time_ms as f64 / 1000.0
    }

    pub fn normalize(&self) -> Sample {
        Sample {
            values: self.gain.normalize(self.full, self.ir, self.visible),
            seconds: self.seconds(),
            gain: self.gain,
        }
    }
}

/// A gain-normalized reading with its timestamp and the gain it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub values: Channels<f64>,
    pub seconds: f64,
    pub gain: Gain,
}

/// Decode one line of the wire protocol.
///
/// Trailing whitespace (including the line terminator) is ignored; fields are
/// separated by exactly one space.
pub fn decode_line(line: &str) -> Result<RawReading> {
    let fields: Vec<&str> = line.trim_end().split(' ').collect();
    if fields.len() != FIELD_COUNT {
        return Err(SensorError::MalformedFrame(format!(
            "expected {} fields, got {} in {:?}",
            FIELD_COUNT,
            fields.len(),
            line.trim_end()
        )));
    }

    let full = parse_int("full", fields[0])?;
    let ir = parse_int("ir", fields[1])?;
    let time_ms = parse_int("time", fields[2])?;
    let gain = Gain::from_code(fields[3])?;
    let visible = full.checked_sub(ir).ok_or_else(|| {
        SensorError::MalformedFrame(format!("visible count {full} - {ir} overflows"))
    })?;

    Ok(RawReading {
        full,
        ir,
        visible,
        time_ms,
        gain,
    })
}

/// Decode raw bytes received from the port. Invalid UTF-8 is a malformed frame.
pub fn decode_bytes(bytes: &[u8]) -> Result<RawReading> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| SensorError::MalformedFrame(format!("invalid utf-8: {e}")))?;
    decode_line(line)
}

fn parse_int(name: &str, field: &str) -> Result<i64> {
    field
        .parse::<i64>()
        .map_err(|e| SensorError::MalformedFrame(format!("{name} field {field:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_line() {
        let raw = decode_line("100 40 2500 16\r\n").unwrap();
        assert_eq!(raw.full, 100);
        assert_eq!(raw.ir, 40);
        assert_eq!(raw.visible, 60);
        assert_eq!(raw.time_ms, 2500);
        assert_eq!(raw.seconds(), 2.5);
        assert_eq!(raw.gain, Gain::Med);

        let sample = raw.normalize();
        assert_eq!(sample.values, Channels::new(4.0, 1.6, 2.4));
        assert_eq!(sample.seconds, 2.5);
        assert_eq!(sample.gain, Gain::Med);
    }

    #[test]
    fn decoding_is_repeatable() {
        let a = decode_line("100 40 2500 16").unwrap();
        let b = decode_line("100 40 2500 16").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        for line in ["100 40 2500", "100 40 2500 16 7", "", "\n", "100  40 2500 16"] {
            assert!(
                matches!(decode_line(line), Err(SensorError::MalformedFrame(_))),
                "{line:?}"
            );
        }
    }

    #[test]
    fn non_integer_field_is_malformed() {
        for line in ["1x0 40 2500 16", "100 4.0 2500 16", "100 40 abc 0"] {
            assert!(
                matches!(decode_line(line), Err(SensorError::MalformedFrame(_))),
                "{line:?}"
            );
        }
    }

    #[test]
    fn unknown_gain_is_reported_not_substituted() {
        match decode_line("100 40 2500 99") {
            Err(SensorError::UnknownGain(code)) => assert_eq!(code, "99"),
            other => panic!("expected UnknownGain, got {other:?}"),
        }
    }

    #[test]
    fn negative_counts_are_not_validated() {
        let raw = decode_line("5 9 0 0").unwrap();
        assert_eq!(raw.visible, -4);
        assert_eq!(raw.normalize().values.visible, -4.0);
    }

    #[test]
    fn overflowing_visible_is_malformed() {
        for line in ["9223372036854775807 -1 0 0", "-9223372036854775808 1 0 16"] {
            assert!(
                matches!(decode_line(line), Err(SensorError::MalformedFrame(_))),
                "{line:?}"
            );
        }
        let raw = decode_line("9223372036854775807 0 0 0").unwrap();
        assert_eq!(raw.visible, i64::MAX);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        assert!(matches!(
            decode_bytes(&[0xff, 0xfe, b' ', b'1']),
            Err(SensorError::MalformedFrame(_))
        ));
        assert_eq!(decode_bytes(b"10 2 1000 48\n").unwrap().gain, Gain::Max);
    }
}
