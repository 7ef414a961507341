//! JSON configuration for a lane-finding job.

use lanefind_calib::{ChessboardParams, GridGraphParams};
use lanefind_core::{PerspectiveError, PerspectiveParams, ThresholdError, ThresholdParams};
use lanefind_tracker::{ParamsError, TrackerParams};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Threshold(#[from] ThresholdError),
    #[error(transparent)]
    Tracker(#[from] ParamsError),
    #[error(transparent)]
    Perspective(#[from] PerspectiveError),
    #[error("calibration pattern {cols}x{rows} needs at least 2x2 inner corners")]
    InvalidPattern { cols: usize, rows: usize },
    #[error("invalid overlay settings: {0}")]
    InvalidOverlay(&'static str),
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("calibration_cache.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Directory of chessboard images; `None` runs without undistortion.
    pub images_dir: Option<PathBuf>,
    /// Inner corners `[cols, rows]`.
    pub pattern: [usize; 2],
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    pub graph: GridGraphParams,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            images_dir: None,
            pattern: [9, 6],
            cache_path: default_cache_path(),
            graph: GridGraphParams::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn chessboard_params(&self) -> ChessboardParams {
        ChessboardParams {
            graph: self.graph.clone(),
            ..ChessboardParams::with_pattern(self.pattern[0], self.pattern[1])
        }
    }
}

/// Picture-in-picture diagnostics drawn over the output frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    /// Weight of the lane fill added onto the undistorted frame.
    pub lane_blend: f32,
    /// Number of boxes across the top; the first holds the text, the next
    /// three the mask, warped and search panels.
    pub box_count: usize,
    /// Gap between boxes and frame border, pixels.
    pub box_offset: usize,
    /// Brightness factor applied inside the boxes.
    pub box_shade: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lane_blend: 0.3,
            box_count: 4,
            box_offset: 10,
            box_shade: 0.3,
        }
    }
}

impl OverlayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lane_blend > 0.0 && self.lane_blend <= 1.0) {
            return Err(ConfigError::InvalidOverlay("lane_blend must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.box_shade) {
            return Err(ConfigError::InvalidOverlay("box_shade must be in [0, 1]"));
        }
        if self.enabled && self.box_count < 4 {
            return Err(ConfigError::InvalidOverlay("box_count must be at least 4"));
        }
        Ok(())
    }
}

/// Complete job configuration; every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub threshold: ThresholdParams,
    pub tracker: TrackerParams,
    pub perspective: PerspectiveParams,
    pub calibration: CalibrationConfig,
    pub overlay: OverlayConfig,
}

impl LaneConfig {
    /// Load a JSON config from disk. The result is not validated.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.threshold.validate()?;
        self.tracker.validate()?;
        self.perspective.validate()?;
        let [cols, rows] = self.calibration.pattern;
        if cols < 2 || rows < 2 {
            return Err(ConfigError::InvalidPattern { cols, rows });
        }
        self.overlay.validate()
    }
}
