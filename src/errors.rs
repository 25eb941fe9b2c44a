use thiserror::Error;

/// Every failure the acquisition and statistics pipeline can report.
///
/// `MalformedFrame` and `UnknownGain` only cost the frame they occur in;
/// the acquisition loop logs them and keeps reading. Everything else stops
/// the loop (or the statistics call) and is surfaced to the caller.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("unknown gain code {0:?} (expected one of 0, 16, 32, 48)")]
    UnknownGain(String),
    #[error("lost connection to device: {0}")]
    ConnectionLost(String),
    #[error("not enough samples: need at least {required}, have {found}")]
    EmptyBuffer { required: usize, found: usize },
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl SensorError {
    /// Whether the acquisition loop may drop the current frame and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SensorError::MalformedFrame(_) | SensorError::UnknownGain(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SensorError>;
