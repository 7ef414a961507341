//! Two-boundary lane tracker on binary bird's-eye masks.
//!
//! A [`LaneState`] owns the left and right [`BoundaryModel`]s of one job and
//! is advanced frame by frame with [`update`]:
//! - while either side is unacquired, a histogram-seeded sliding-window
//!   search collects pixels for both sides;
//! - once both sides track, a local search reuses the previous fits;
//! - each side's pixels are fitted with a quadratic `x(y)` in pixels and in
//!   meters, giving curvature radius and lateral offset.
//!
//! A side whose search comes back empty (or too sparse to fit) keeps its
//! previous fit for the frame. After `degraded_frame_limit` consecutive
//! failures it drops back to sliding-window acquisition.
//!
//! ```
//! use lanefind_core::GrayImage;
//! use lanefind_tracker::{LaneState, SearchStrategy, TrackerParams};
//!
//! let mut mask = GrayImage::new(320, 180);
//! for y in 0..180 {
//!     mask.set(100, y, 255);
//!     mask.set(240, y, 255);
//! }
//! let params = TrackerParams { margin: 40, min_recenter_pixels: 10, ..TrackerParams::default() };
//! let mut state = LaneState::new(320, 180, params).unwrap();
//! let out = state.update(&mask.view()).unwrap();
//! assert_eq!(out.strategy, SearchStrategy::SlidingWindow);
//! assert!(out.measurement.unwrap().curvature_m.is_infinite());
//! ```

mod boundary;
mod error;
mod params;
mod polyfit;
mod search;
mod state;
pub mod visualize;

pub use boundary::{transition, BoundaryModel, FitEvent, Side, SideFit, TrackingStatus};
pub use error::TrackError;
pub use params::{ParamsError, TrackerParams};
pub use polyfit::{fit_quadratic, radius_of_curvature, QuadraticFit, STRAIGHT_EPS};
pub use search::{
    band_pixels, bottom_half_histogram, histogram_bases, local_search, sliding_window_search,
    PixelSet, SearchStrategy, SearchWindow, SlidingWindowResult,
};
pub use state::{update, LaneMeasurement, LaneState, TrackOutput};
