use crate::boundary::Side;

/// Errors produced while tracking a frame.
///
/// `NoPixelsFound` and `UnderdeterminedFit` are per-side and recoverable:
/// [`crate::update`] reports them in [`crate::TrackOutput::failures`] and
/// keeps the previous fit. Only `FrameSizeMismatch` is returned as `Err`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("no lane pixels found for the {side} boundary")]
    NoPixelsFound { side: Side },
    #[error("{side} boundary has {pixels} pixels on fewer than 3 distinct rows")]
    UnderdeterminedFit { side: Side, pixels: usize },
    #[error("frame is {got_width}x{got_height}, tracker state expects {width}x{height}")]
    FrameSizeMismatch {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
}

impl TrackError {
    /// Side a recoverable failure belongs to.
    pub fn side(&self) -> Option<Side> {
        match self {
            TrackError::NoPixelsFound { side } | TrackError::UnderdeterminedFit { side, .. } => {
                Some(*side)
            }
            TrackError::FrameSizeMismatch { .. } => None,
        }
    }
}
