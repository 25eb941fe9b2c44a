//! Timed acquisition loop.
//!
//! Reads frames until the requested duration has elapsed. Bad frames are
//! dropped and logged; a lost connection or any other failure ends the run
//! early. Either way the samples collected so far stay in the buffer and the
//! outcome is returned as an [`AcquisitionReport`] rather than an error.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::connection::LineSource;
use crate::errors::SensorError;
use crate::frame;

/// Why an acquisition run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The requested duration elapsed.
    Deadline,
    ConnectionLost(String),
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionReport {
    /// Frames decoded and stored.
    pub samples: usize,
    /// Frames rejected as malformed or carrying an unknown gain.
    pub dropped: usize,
    /// Reads that timed out before any data arrived.
    pub timeouts: usize,
    pub elapsed: Duration,
    pub stop: StopReason,
}

impl AcquisitionReport {
    /// True when the run lasted the full duration.
    pub fn completed(&self) -> bool {
        self.stop == StopReason::Deadline
    }

    /// Description of the failure that ended the run early, if any.
    pub fn failure(&self) -> Option<&str> {
        match &self.stop {
            StopReason::Deadline => None,
            StopReason::ConnectionLost(msg) | StopReason::Unexpected(msg) => Some(msg),
        }
    }
}

fn stop_reason(err: SensorError) -> StopReason {
    match err {
        SensorError::ConnectionLost(msg) => StopReason::ConnectionLost(msg),
        other => StopReason::Unexpected(other.to_string()),
    }
}

/// Collect frames from `source` into `buffer` for `duration`.
///
/// Queued input is discarded and the buffer cleared before the first read;
/// the clock starts once the flush is done. The deadline is checked once per
/// frame, so a run can overshoot it by at most one read timeout.
pub fn acquire<S: LineSource + ?Sized>(
    source: &mut S,
    duration: Duration,
    buffer: &mut SampleBuffer,
) -> AcquisitionReport {
    let mut counts = Counts::default();
    buffer.clear();

    let (stop, elapsed) = match source.discard_input() {
        Ok(()) => {
            let start = Instant::now();
            info!("Collecting intensity values for {:?}...", duration);
            let stop = run(source, duration, buffer, start, &mut counts);
            (stop, start.elapsed())
        }
        Err(e) => {
            error!("Could not flush input before acquisition: {e}");
            (stop_reason(e), Duration::ZERO)
        }
    };

    let report = AcquisitionReport {
        samples: buffer.len(),
        dropped: counts.dropped,
        timeouts: counts.timeouts,
        elapsed,
        stop,
    };

    match &report.stop {
        StopReason::Deadline => info!(
            "Intensity values collected: {} samples, {} dropped frames, {} empty reads",
            report.samples, report.dropped, report.timeouts
        ),
        StopReason::ConnectionLost(msg) => error!(
            "Lost connection to device ({msg}); keeping {} samples",
            report.samples
        ),
        StopReason::Unexpected(msg) => error!(
            "Acquisition aborted ({msg}); keeping {} samples",
            report.samples
        ),
    }
    report
}

#[derive(Default)]
struct Counts {
    dropped: usize,
    timeouts: usize,
}

fn run<S: LineSource + ?Sized>(
    source: &mut S,
    duration: Duration,
    buffer: &mut SampleBuffer,
    start: Instant,
    counts: &mut Counts,
) -> StopReason {
    while start.elapsed() < duration {
        let line = match source.read_line() {
            Ok(line) => line,
            Err(e) if e.is_recoverable() => {
                counts.dropped += 1;
                warn!("Frame dropped, continuing collection: {e}");
                continue;
            }
            Err(e) => return stop_reason(e),
        };

        // a read timeout on an idle link hands back nothing
        if line.iter().all(u8::is_ascii_whitespace) {
            counts.timeouts += 1;
            debug!("No frame before read timeout");
            continue;
        }

        match frame::decode_bytes(&line) {
            Ok(raw) => {
                let sample = raw.normalize();
                debug!(
                    "t={:.3}s gain={} full={} ir={} visible={}",
                    sample.seconds,
                    sample.gain,
                    sample.values.full,
                    sample.values.ir,
                    sample.values.visible
                );
                buffer.push(sample);
            }
            Err(e) if e.is_recoverable() => {
                counts.dropped += 1;
                warn!("Frame dropped, continuing collection: {e}");
            }
            Err(e) => return stop_reason(e),
        }
    }
    StopReason::Deadline
}
