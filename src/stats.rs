//! Per-channel statistics with error propagation.
//!
//! Two independent error sources are combined in quadrature: the standard
//! error of the mean (sample fluctuation) and the quantization error of the
//! integer counts reported by the sensor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::errors::{Result, SensorError};

/// One value per spectral channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Channels<T> {
    pub full: T,
    pub ir: T,
    pub visible: T,
}

impl<T> Channels<T> {
    pub const fn new(full: T, ir: T, visible: T) -> Self {
        Self { full, ir, visible }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Channels<U> {
        Channels {
            full: f(self.full),
            ir: f(self.ir),
            visible: f(self.visible),
        }
    }

    pub fn zip<U>(self, other: Channels<U>) -> Channels<(T, U)> {
        Channels {
            full: (self.full, other.full),
            ir: (self.ir, other.ir),
            visible: (self.visible, other.visible),
        }
    }
}

impl<T: Copy> Channels<T> {
    pub const fn splat(value: T) -> Self {
        Self {
            full: value,
            ir: value,
            visible: value,
        }
    }
}

/// Mean and combined uncertainty for each channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub mean: Channels<f64>,
    pub error: Channels<f64>,
}

impl Summary {
    pub const ZERO: Summary = Summary {
        mean: Channels::splat(0.0),
        error: Channels::splat(0.0),
    };
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Full: {:.6} ± {:.6}", self.mean.full, self.error.full)?;
        writeln!(f, "IR: {:.6} ± {:.6}", self.mean.ir, self.error.ir)?;
        write!(f, "Visible: {:.6} ± {:.6}", self.mean.visible, self.error.visible)
    }
}

// ----------------------------------------------------------------------------
// Single-series helpers
// ----------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> Result<f64> {
    require(values, 1)?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with Bessel's correction (n - 1).
pub fn std_dev(values: &[f64]) -> Result<f64> {
    require(values, 2)?;
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok((ss / (values.len() - 1) as f64).sqrt())
}

/// Standard deviation of the mean.
pub fn standard_error(values: &[f64]) -> Result<f64> {
    Ok(std_dev(values)? / (values.len() as f64).sqrt())
}

/// Quadrature sum of two independent uncertainties.
#[inline]
pub fn quadrature(a: f64, b: f64) -> f64 {
    (a * a + b * b).sqrt()
}

fn require(values: &[f64], required: usize) -> Result<()> {
    if values.len() < required {
        return Err(SensorError::EmptyBuffer {
            required,
            found: values.len(),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Buffer statistics
// ----------------------------------------------------------------------------

fn per_channel(buffer: &SampleBuffer, f: impl Fn(&[f64]) -> Result<f64>) -> Result<Channels<f64>> {
    Ok(Channels {
        full: f(buffer.full())?,
        ir: f(buffer.ir())?,
        visible: f(buffer.visible())?,
    })
}

pub fn average(buffer: &SampleBuffer) -> Result<Channels<f64>> {
    per_channel(buffer, mean)
}

pub fn standard_deviation(buffer: &SampleBuffer) -> Result<Channels<f64>> {
    per_channel(buffer, std_dev)
}

pub fn fluctuation_error(buffer: &SampleBuffer) -> Result<Channels<f64>> {
    per_channel(buffer, standard_error)
}

/// Quantization error of the whole buffer.
///
/// Uses the gain of the most recent sample for every sample in the buffer,
/// even when the gain changed during the run.
pub fn quantization_error(buffer: &SampleBuffer) -> Result<Channels<f64>> {
    let gain = buffer.last_gain().ok_or(SensorError::EmptyBuffer {
        required: 1,
        found: 0,
    })?;
    Ok(Channels::splat(gain.quantization_error()))
}

/// Fluctuation and quantization error combined in quadrature.
pub fn total_error(buffer: &SampleBuffer) -> Result<Channels<f64>> {
    let fluct = fluctuation_error(buffer)?;
    let quant = quantization_error(buffer)?;
    Ok(fluct.zip(quant).map(|(a, b)| quadrature(a, b)))
}

pub fn summarize(buffer: &SampleBuffer) -> Result<Summary> {
    Ok(Summary {
        mean: average(buffer)?,
        error: total_error(buffer)?,
    })
}
