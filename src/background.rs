//! Ambient-light baseline subtracted from later measurements.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::stats::{Channels, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackgroundState {
    /// Baseline and uncertainty are zero on every channel.
    #[default]
    Unset,
    /// Baseline captured from a completed acquisition run.
    Set,
}

/// Holds the background mean and its combined uncertainty per channel.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTracker {
    baseline: Summary,
    state: BackgroundState,
}

impl BackgroundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a background measurement, replacing any previous one.
    pub fn capture(&mut self, summary: Summary) {
        if self.state == BackgroundState::Set {
            debug!("Overwriting previous background {:?}", self.baseline.mean);
        }
        self.baseline = summary;
        self.state = BackgroundState::Set;
        info!(
            "Background set: full={:.6} ir={:.6} visible={:.6}",
            summary.mean.full, summary.mean.ir, summary.mean.visible
        );
    }

    pub fn reset(&mut self) {
        self.baseline = Summary::ZERO;
        self.state = BackgroundState::Unset;
        debug!("Background reset to zero");
    }

    pub fn state(&self) -> BackgroundState {
        self.state
    }

    pub fn is_set(&self) -> bool {
        self.state == BackgroundState::Set
    }

    /// Current baseline (all zeros while unset).
    pub fn baseline(&self) -> Summary {
        self.baseline
    }

    /// Per-channel means to subtract from a measurement.
    pub fn means(&self) -> Channels<f64> {
        self.baseline.mean
    }
}
