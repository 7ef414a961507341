use serde::{Deserialize, Serialize};

/// Invalid tracker configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite and positive (got {value})")]
    InvalidScale { name: &'static str, value: f64 },
    #[error("frame height {height} is smaller than window_count {window_count}")]
    TooManyWindows { height: usize, window_count: usize },
}

/// Search and scale parameters shared by both boundaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Number of horizontal bands for the sliding-window search.
    pub window_count: usize,
    /// Half-width of a search window (and of the local-search band), pixels.
    pub margin: u32,
    /// A band recenters the next window only when it collected strictly
    /// more pixels than this.
    pub min_recenter_pixels: usize,
    /// Meters per pixel along x in the bird's-eye view.
    pub xm_per_pix: f64,
    /// Meters per pixel along y in the bird's-eye view.
    pub ym_per_pix: f64,
    /// Consecutive failed frames after which a side is re-acquired.
    pub degraded_frame_limit: u32,
    /// Number of successful fits kept per side.
    pub history_len: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            window_count: 9,
            margin: 100,
            min_recenter_pixels: 50,
            xm_per_pix: 3.7 / 700.0,
            ym_per_pix: 30.0 / 720.0,
            degraded_frame_limit: 3,
            history_len: 5,
        }
    }
}

impl TrackerParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let counts = [
            ("window_count", self.window_count as f64),
            ("margin", self.margin as f64),
            ("degraded_frame_limit", self.degraded_frame_limit as f64),
            ("history_len", self.history_len as f64),
        ];
        for (name, value) in counts {
            if value <= 0.0 {
                return Err(ParamsError::NonPositive { name, value });
            }
        }
        for (name, value) in [("xm_per_pix", self.xm_per_pix), ("ym_per_pix", self.ym_per_pix)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ParamsError::InvalidScale { name, value });
            }
        }
        Ok(())
    }

    /// Height of one sliding-window band for a frame of `height` rows.
    #[inline]
    pub fn window_height(&self, height: usize) -> usize {
        height / self.window_count.max(1)
    }
}
