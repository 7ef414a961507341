use chess_corners::ChessConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 6.0,
            max_spacing_pix: 250.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Parameters of the chessboard detector.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// Inner corners per row.
    pub cols: usize,
    /// Inner corners per column.
    pub rows: usize,
    /// ChESS peaks below `threshold_rel * max_response` are dropped.
    pub threshold_rel: f32,
    pub nms_radius: u32,
    pub graph: GridGraphParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            cols: 9,
            rows: 6,
            threshold_rel: 0.2,
            nms_radius: 2,
            graph: GridGraphParams::default(),
        }
    }
}

impl ChessboardParams {
    pub fn with_pattern(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            ..Self::default()
        }
    }

    pub fn pattern(&self) -> [usize; 2] {
        [self.cols, self.rows]
    }

    /// Single-scale `chess-corners` settings for these thresholds.
    pub fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel;
        cfg.params.nms_radius = self.nms_radius;
        cfg
    }
}
