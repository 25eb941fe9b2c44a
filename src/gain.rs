//! Sensor gain levels and removal of the gain multiplier.
//!
//! The Arduino sketch reports counts at whatever gain the TSL2591 was set to,
//! together with the gain register value. Dividing by the multiplier below
//! makes readings taken at different gains comparable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SensorError};
use crate::stats::Channels;

/// Smallest step of the integer counts reported by the sensor, halved.
const HALF_COUNT: f64 = 0.5;

/// Gain setting reported alongside every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gain {
    /// 1x
    #[default]
    Low,
    /// 25x
    Med,
    /// 428x
    High,
    /// 9876x
    Max,
}

impl Gain {
    pub const ALL: [Gain; 4] = [Gain::Low, Gain::Med, Gain::High, Gain::Max];

    /// Parse the gain code as it appears on the wire.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "0" => Ok(Gain::Low),
            "16" => Ok(Gain::Med),
            "32" => Ok(Gain::High),
            "48" => Ok(Gain::Max),
            other => Err(SensorError::UnknownGain(other.to_string())),
        }
    }

    /// Wire code for this gain.
    pub fn code(self) -> &'static str {
        match self {
            Gain::Low => "0",
            Gain::Med => "16",
            Gain::High => "32",
            Gain::Max => "48",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gain::Low => "LOW",
            Gain::Med => "MED",
            Gain::High => "HIGH",
            Gain::Max => "MAX",
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Gain::Low => 1.0,
            Gain::Med => 25.0,
            Gain::High => 428.0,
            Gain::Max => 9876.0,
        }
    }

    /// Divide the gain multiplier out of a raw (full, ir, visible) triple.
    pub fn normalize(self, full: i64, ir: i64, visible: i64) -> Channels<f64> {
        let m = self.multiplier();
        Channels::new(full as f64 / m, ir as f64 / m, visible as f64 / m)
    }

    /// Uncertainty from integer reporting: half a count, scaled by the gain.
    pub fn quantization_error(self) -> f64 {
        HALF_COUNT / self.multiplier()
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gain {
    type Err = SensorError;

    /// Accepts either the label ("MED") or the wire code ("16").
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Gain::Low),
            "MED" => Ok(Gain::Med),
            "HIGH" => Ok(Gain::High),
            "MAX" => Ok(Gain::Max),
            _ => Gain::from_code(s),
        }
    }
}

/// (label, multiplier) pairs, highest gain first, for re-applying a gain to
/// recorded data.
pub fn multiplier_table() -> Vec<(&'static str, f64)> {
    Gain::ALL
        .iter()
        .rev()
        .map(|g| (g.label(), g.multiplier()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_levels() {
        assert_eq!(Gain::from_code("0").unwrap(), Gain::Low);
        assert_eq!(Gain::from_code("16").unwrap(), Gain::Med);
        assert_eq!(Gain::from_code("32").unwrap(), Gain::High);
        assert_eq!(Gain::from_code("48").unwrap(), Gain::Max);
        for g in Gain::ALL {
            assert_eq!(Gain::from_code(g.code()).unwrap(), g);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        for code in ["99", "", "1", "016", "LOW"] {
            match Gain::from_code(code) {
                Err(SensorError::UnknownGain(c)) => assert_eq!(c, code),
                other => panic!("expected UnknownGain for {code:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn normalize_divides_by_multiplier() {
        let expected = [(Gain::Low, 1.0), (Gain::Med, 25.0), (Gain::High, 428.0), (Gain::Max, 9876.0)];
        for (gain, m) in expected {
            let c = gain.normalize(1000, 300, 700);
            assert_eq!(c.full, 1000.0 / m);
            assert_eq!(c.ir, 300.0 / m);
            assert_eq!(c.visible, 700.0 / m);
        }
    }

    #[test]
    fn quantization_error_is_half_count_over_multiplier() {
        assert_eq!(Gain::Low.quantization_error(), 0.5);
        assert_eq!(Gain::Med.quantization_error(), 0.5 / 25.0);
        assert_eq!(Gain::High.quantization_error(), 0.5 / 428.0);
        assert_eq!(Gain::Max.quantization_error(), 0.5 / 9876.0);
    }

    #[test]
    fn parse_label_or_code() {
        assert_eq!("high".parse::<Gain>().unwrap(), Gain::High);
        assert_eq!("48".parse::<Gain>().unwrap(), Gain::Max);
        assert!("huge".parse::<Gain>().is_err());
        assert_eq!(Gain::Med.to_string(), "MED");
    }

    #[test]
    fn multiplier_table_lists_highest_first() {
        let table = multiplier_table();
        assert_eq!(
            table,
            vec![("MAX", 9876.0), ("HIGH", 428.0), ("MED", 25.0), ("LOW", 1.0)]
        );
    }
}
