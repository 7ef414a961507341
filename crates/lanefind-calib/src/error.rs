/// Errors from collecting correspondences and solving the camera model.
///
/// All of them are fatal for a session: the pipeline cannot undistort
/// without a profile.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("no usable chessboard found in {tried} calibration images")]
    NoUsableImages { tried: usize },
    #[error("pattern {got:?} does not match the expected {expected:?}")]
    PatternMismatch {
        expected: [usize; 2],
        got: [usize; 2],
    },
    #[error("invalid calibration image size {width}x{height}")]
    InvalidImageSize { width: usize, height: usize },
    #[error("view {view} yields a degenerate board homography")]
    DegenerateView { view: usize },
    #[error("camera model solve failed: {0}")]
    SolveFailed(&'static str),
    #[error("frame is {got_width}x{got_height}, undistort map was built for {width}x{height}")]
    FrameSize {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
}

/// Errors reading or writing the calibration cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
