//! Planar camera calibration for the lane pipeline.
//!
//! ## Quickstart
//!
//! ```
//! use lanefind_calib::{calibrate, CalibrationCorrespondences, CalibrationError};
//!
//! let corr = CalibrationCorrespondences::new([9, 6]);
//! let result = calibrate(&corr, (1280, 720));
//! assert!(matches!(result, Err(CalibrationError::NoUsableImages { .. })));
//! ```
//!
//! Pipeline:
//! 1. ChESS X-junctions from `chess-corners`, duplicate peaks merged.
//! 2. 4-connected corner graph from orthogonal corner orientations.
//! 3. BFS labelling with integer grid coordinates, pick the strongest
//!    complete `cols x rows` window (either board orientation).
//! 4. Per-view board homographies, closed-form intrinsics, homography
//!    extrinsics.
//! 5. Levenberg–Marquardt refinement of intrinsics, distortion and poses.
//!
//! Undistortion remaps through [`UndistortMap`], which can be built once per
//! frame size and reused.

mod cache;
mod calibrate;
mod camera;
mod detector;
mod error;
mod geom;
mod gridgraph;
mod optimize;
mod params;
mod undistort;

pub use cache::CalibrationCache;
pub use calibrate::{calibrate, CalibrationCorrespondences};
pub use camera::{CalibrationProfile, Distortion};
pub use detector::{
    detect_chessboard, detect_corners, suppress_duplicates, ChessboardCorners, Corner,
};
pub use error::{CacheError, CalibrationError};
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor};
pub use optimize::{levenberg_marquardt, LmOptions, LmReport};
pub use params::{ChessboardParams, GridGraphParams};
pub use undistort::{undistort_gray, undistort_rgb, UndistortMap};
