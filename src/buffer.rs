//! Samples collected during one acquisition run.

use serde::{Deserialize, Serialize};

use crate::frame::Sample;
use crate::gain::Gain;
use crate::stats::Channels;

/// Append-only store of normalized samples, kept as parallel columns.
///
/// All columns always have the same length. The buffer is cleared at the
/// start of every acquisition run, so callers that need the data of a run
/// must take a [`SampleSnapshot`] before starting the next one.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    full: Vec<f64>,
    ir: Vec<f64>,
    visible: Vec<f64>,
    seconds: Vec<f64>,
    gains: Vec<Gain>,
}

/// Owned copy of a buffer's columns, independent of later runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSnapshot {
    pub full: Vec<f64>,
    pub ir: Vec<f64>,
    pub visible: Vec<f64>,
    pub seconds: Vec<f64>,
    pub gains: Vec<Gain>,
}

impl SampleSnapshot {
    pub fn len(&self) -> usize {
        self.full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.full.push(sample.values.full);
        self.ir.push(sample.values.ir);
        self.visible.push(sample.values.visible);
        self.seconds.push(sample.seconds);
        self.gains.push(sample.gain);
    }

    pub fn clear(&mut self) {
        self.full.clear();
        self.ir.clear();
        self.visible.clear();
        self.seconds.clear();
        self.gains.clear();
    }

    pub fn len(&self) -> usize {
        self.full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    pub fn full(&self) -> &[f64] {
        &self.full
    }

    pub fn ir(&self) -> &[f64] {
        &self.ir
    }

    pub fn visible(&self) -> &[f64] {
        &self.visible
    }

    /// Board timestamps in seconds.
    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    pub fn gains(&self) -> &[Gain] {
        &self.gains
    }

    /// Gain of the most recently appended sample.
    pub fn last_gain(&self) -> Option<Gain> {
        self.gains.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample {
            values: Channels::new(
                *self.full.get(index)?,
                *self.ir.get(index)?,
                *self.visible.get(index)?,
            ),
            seconds: *self.seconds.get(index)?,
            gain: *self.gains.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Subtract a per-channel baseline from every stored sample in place.
    pub fn subtract_baseline(&mut self, baseline: &Channels<f64>) {
        self.full.iter_mut().for_each(|v| *v -= baseline.full);
        self.ir.iter_mut().for_each(|v| *v -= baseline.ir);
        self.visible.iter_mut().for_each(|v| *v -= baseline.visible);
    }

    pub fn snapshot(&self) -> SampleSnapshot {
        SampleSnapshot {
            full: self.full.clone(),
            ir: self.ir.clone(),
            visible: self.visible.clone(),
            seconds: self.seconds.clone(),
            gains: self.gains.clone(),
        }
    }

    /// Move the collected columns out, leaving the buffer empty.
    pub fn take(&mut self) -> SampleSnapshot {
        SampleSnapshot {
            full: std::mem::take(&mut self.full),
            ir: std::mem::take(&mut self.ir),
            visible: std::mem::take(&mut self.visible),
            seconds: std::mem::take(&mut self.seconds),
            gains: std::mem::take(&mut self.gains),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats;

    fn sample(full: f64, ir: f64, seconds: f64, gain: Gain) -> Sample {
        Sample {
            values: Channels::new(full, ir, full - ir),
            seconds,
            gain,
        }
    }

    fn columns_agree(buf: &SampleBuffer) -> bool {
        let n = buf.len();
        buf.ir().len() == n
            && buf.visible().len() == n
            && buf.seconds().len() == n
            && buf.gains().len() == n
    }

    #[test]
    fn push_keeps_columns_aligned_and_ordered() {
        let mut buf = SampleBuffer::new();
        buf.push(sample(3.0, 1.0, 0.1, Gain::Low));
        buf.push(sample(5.0, 2.0, 0.2, Gain::Med));
        assert_eq!(buf.len(), 2);
        assert!(columns_agree(&buf));
        assert_eq!(buf.full(), &[3.0, 5.0]);
        assert_eq!(buf.visible(), &[2.0, 3.0]);
        assert_eq!(buf.seconds(), &[0.1, 0.2]);
        assert_eq!(buf.gains(), &[Gain::Low, Gain::Med]);
        assert_eq!(buf.last_gain(), Some(Gain::Med));
        assert_eq!(buf.get(1), Some(sample(5.0, 2.0, 0.2, Gain::Med)));
        assert_eq!(buf.iter().count(), 2);
    }

    #[test]
    fn clear_empties_every_column() {
        let mut buf = SampleBuffer::new();
        buf.push(sample(3.0, 1.0, 0.1, Gain::Low));
        buf.clear();
        assert!(buf.is_empty());
        assert!(columns_agree(&buf));
        assert_eq!(buf.last_gain(), None);
    }

    #[test]
    fn snapshot_is_independent_of_later_runs() {
        let mut buf = SampleBuffer::new();
        buf.push(sample(3.0, 1.0, 0.1, Gain::Low));
        let snap = buf.snapshot();
        buf.clear();
        buf.push(sample(9.0, 9.0, 0.5, Gain::Max));
        assert_eq!(snap.full, vec![3.0]);
        assert_eq!(snap.gains, vec![Gain::Low]);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn take_moves_data_out() {
        let mut buf = SampleBuffer::new();
        buf.push(sample(3.0, 1.0, 0.1, Gain::Low));
        let snap = buf.take();
        assert_eq!(snap.len(), 1);
        assert!(buf.is_empty());
        assert!(columns_agree(&buf));
    }

    #[test]
    fn baseline_subtraction_is_linear() {
        let mut buf = SampleBuffer::new();
        for (i, v) in [4.0, 7.5, 12.25, 1.0].into_iter().enumerate() {
            buf.push(sample(v, v / 4.0, i as f64, Gain::Low));
        }
        let before = stats::average(&buf).unwrap();
        let baseline = Channels::new(2.0, 0.5, 1.5);
        buf.subtract_baseline(&baseline);
        let after = stats::average(&buf).unwrap();
        assert!((after.full - (before.full - baseline.full)).abs() < 1e-12);
        assert!((after.ir - (before.ir - baseline.ir)).abs() < 1e-12);
        assert!((after.visible - (before.visible - baseline.visible)).abs() < 1e-12);
    }

    #[test]
    fn subtraction_leaves_timestamps_and_gains() {
        let mut buf = SampleBuffer::new();
        buf.push(sample(3.0, 1.0, 0.1, Gain::High));
        buf.subtract_baseline(&Channels::splat(1.0));
        assert_eq!(buf.full(), &[2.0]);
        assert_eq!(buf.seconds(), &[0.1]);
        assert_eq!(buf.gains(), &[Gain::High]);
    }
}
