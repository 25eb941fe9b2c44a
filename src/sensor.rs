//! Measurement session for one light sensor.
//!
//! A [`LightSensor`] owns its connection, the samples of the latest run and
//! the background baseline. Nothing is shared between sessions.
//!
//! # Example
//! ```ignore
//! let conn = SerialConnection::open(&SerialSettings::new("/dev/ttyACM0"))?;
//! let mut sensor = LightSensor::new(conn);
//!
//! sensor.set_background(Duration::from_secs(10))?;   // lamp off
//! let m = sensor.collect_data(Duration::from_secs(10))?; // lamp on
//! println!("{}", m.summary);
//! ```

use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::acquisition::{acquire, AcquisitionReport};
use crate::background::BackgroundTracker;
use crate::buffer::{SampleBuffer, SampleSnapshot};
use crate::connection::LineSource;
use crate::errors::Result;
use crate::gain::Gain;
use crate::stats::{self, Channels, Summary};

/// Outcome of a background-subtracted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub report: AcquisitionReport,
    pub summary: Summary,
}

pub struct LightSensor<C: LineSource> {
    connection: C,
    buffer: SampleBuffer,
    background: BackgroundTracker,
}

impl<C: LineSource> LightSensor<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            buffer: SampleBuffer::new(),
            background: BackgroundTracker::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------------

    /// Collect raw (not background-subtracted) samples for `duration`.
    ///
    /// Replaces the samples of the previous run.
    pub fn read(&mut self, duration: Duration) -> AcquisitionReport {
        acquire(&mut self.connection, duration, &mut self.buffer)
    }

    /// Measure the ambient background for `duration` and store its mean and
    /// total error as the new baseline.
    ///
    /// If too few samples arrive to compute an error the previous baseline is
    /// kept and the error is returned.
    pub fn set_background(&mut self, duration: Duration) -> Result<Summary> {
        let report = self.read(duration);
        let summary = stats::summarize(&self.buffer)?;
        if let Some(reason) = report.failure() {
            info!("Background taken from a partial run ({reason})");
        }
        self.background.capture(summary);
        Ok(summary)
    }

    pub fn reset_background(&mut self) {
        self.background.reset();
    }

    pub fn background(&self) -> Summary {
        self.background.baseline()
    }

    pub fn background_tracker(&self) -> &BackgroundTracker {
        &self.background
    }

    /// Collect samples for `duration`, subtract the background means from
    /// every sample and summarize the result.
    ///
    /// The subtracted samples remain available through [`recent`](Self::recent).
    pub fn collect_data(&mut self, duration: Duration) -> Result<Measurement> {
        let report = self.read(duration);
        self.buffer.subtract_baseline(&self.background.means());
        let summary = stats::summarize(&self.buffer)?;
        info!("Average\n{summary}");
        Ok(Measurement { report, summary })
    }

    // ------------------------------------------------------------------------
    // Statistics over the latest run
    // ------------------------------------------------------------------------

    pub fn average(&self) -> Result<Channels<f64>> {
        stats::average(&self.buffer)
    }

    pub fn standard_deviation(&self) -> Result<Channels<f64>> {
        stats::standard_deviation(&self.buffer)
    }

    pub fn fluctuation_error(&self) -> Result<Channels<f64>> {
        stats::fluctuation_error(&self.buffer)
    }

    /// Quantization error, based on the gain of the last sample.
    pub fn integer_error(&self) -> Result<Channels<f64>> {
        stats::quantization_error(&self.buffer)
    }

    pub fn total_error(&self) -> Result<Channels<f64>> {
        stats::total_error(&self.buffer)
    }

    pub fn summary(&self) -> Result<Summary> {
        stats::summarize(&self.buffer)
    }

    // ------------------------------------------------------------------------
    // Raw data
    // ------------------------------------------------------------------------

    /// Copy of the latest run's samples.
    pub fn recent(&self) -> SampleSnapshot {
        self.buffer.snapshot()
    }

    pub fn gain_history(&self) -> Vec<Gain> {
        self.buffer.gains().to_vec()
    }

    /// Move the latest run's samples out of the session.
    pub fn take_samples(&mut self) -> SampleSnapshot {
        self.buffer.take()
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// End the session and hand back the connection.
    pub fn into_connection(self) -> C {
        self.connection
    }
}
