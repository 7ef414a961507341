use crate::boundary::{BoundaryModel, Side, SideFit, TrackingStatus};
use crate::error::TrackError;
use crate::params::{ParamsError, TrackerParams};
use crate::polyfit::{fit_quadratic, radius_of_curvature, QuadraticFit};
use crate::search::{local_search, sliding_window_search, PixelSet, SearchStrategy, SearchWindow};
use crate::visualize::{render_local_search, render_sliding_windows};
use lanefind_core::{GrayImageView, RgbImage};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Lane geometry reported for a frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LaneMeasurement {
    /// Mean of both radii, meters. Infinite when both boundaries are straight.
    pub curvature_m: f64,
    pub left_radius_m: f64,
    pub right_radius_m: f64,
    /// Distance between lane centre and frame centre, meters.
    pub offset_m: f64,
    /// Lane centre minus frame centre, meters; positive when the lane centre
    /// lies right of the frame centre.
    pub signed_offset_m: f64,
}

/// Result of one [`update`] step.
#[derive(Clone, Debug)]
pub struct TrackOutput {
    pub strategy: SearchStrategy,
    /// `None` until both sides have been fitted at least once.
    pub measurement: Option<LaneMeasurement>,
    /// Recoverable per-side failures of this frame.
    pub failures: Vec<TrackError>,
    /// Bird's-eye mask annotated with the search.
    pub search_image: RgbImage,
    /// Sliding windows used this frame (empty for local search).
    pub windows: Vec<SearchWindow>,
}

impl TrackOutput {
    pub fn degraded_sides(&self) -> Vec<Side> {
        self.failures.iter().filter_map(TrackError::side).collect()
    }
}

/// Tracker state for one job: both boundaries plus the frame geometry.
#[derive(Clone, Debug)]
pub struct LaneState {
    left: BoundaryModel,
    right: BoundaryModel,
    params: TrackerParams,
    width: usize,
    height: usize,
}

impl LaneState {
    pub fn new(width: usize, height: usize, params: TrackerParams) -> Result<Self, ParamsError> {
        params.validate()?;
        if height < params.window_count {
            return Err(ParamsError::TooManyWindows {
                height,
                window_count: params.window_count,
            });
        }
        Ok(Self {
            left: BoundaryModel::new(Side::Left, params.history_len),
            right: BoundaryModel::new(Side::Right, params.history_len),
            params,
            width,
            height,
        })
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn left(&self) -> &BoundaryModel {
        &self.left
    }

    pub fn right(&self) -> &BoundaryModel {
        &self.right
    }

    pub fn boundary(&self, side: Side) -> &BoundaryModel {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Current pixel-space fits of both sides, once both exist.
    pub fn fits(&self) -> Option<(QuadraticFit, QuadraticFit)> {
        self.left.current_fit.zip(self.right.current_fit)
    }

    /// Coefficient-wise mean of each side's recent fits, once both sides have
    /// one. Steadier than [`LaneState::fits`] for drawing.
    pub fn smoothed_fits(&self) -> Option<(QuadraticFit, QuadraticFit)> {
        self.left.smoothed_fit().zip(self.right.smoothed_fit())
    }

    /// Put both sides back to `Unacquired`; the next frame uses sliding windows.
    pub fn force_reacquire(&mut self) {
        self.left.status = TrackingStatus::Unacquired;
        self.right.status = TrackingStatus::Unacquired;
    }

    /// Curvature and offset from the stored fits.
    pub fn measurement(&self) -> Option<LaneMeasurement> {
        let left_radius_m = self.left.curvature_radius?;
        let right_radius_m = self.right.curvature_radius?;
        let left_x = self.left.base_x?;
        let right_x = self.right.base_x?;

        let lane_centre = left_x + (right_x - left_x) / 2.0;
        let frame_centre = self.width as f64 / 2.0;
        let signed_offset_m = (lane_centre - frame_centre) * self.params.xm_per_pix;

        Some(LaneMeasurement {
            curvature_m: (left_radius_m + right_radius_m) / 2.0,
            left_radius_m,
            right_radius_m,
            offset_m: signed_offset_m.abs(),
            signed_offset_m,
        })
    }

    pub fn update(
        &mut self,
        binary_warped: &GrayImageView<'_>,
    ) -> Result<TrackOutput, TrackError> {
        update(self, binary_warped)
    }

    fn fit_side(&self, side: Side, pixels: &PixelSet) -> Result<SideFit, TrackError> {
        if pixels.is_empty() {
            return Err(TrackError::NoPixelsFound { side });
        }
        let underdetermined = || TrackError::UnderdeterminedFit {
            side,
            pixels: pixels.len(),
        };

        let xs: Vec<f64> = pixels.x.iter().map(|&x| x as f64).collect();
        let ys: Vec<f64> = pixels.y.iter().map(|&y| y as f64).collect();
        let pixel_fit = fit_quadratic(&xs, &ys).ok_or_else(underdetermined)?;

        let xm = self.params.xm_per_pix;
        let ym = self.params.ym_per_pix;
        let xs_m: Vec<f64> = xs.iter().map(|x| x * xm).collect();
        let ys_m: Vec<f64> = ys.iter().map(|y| y * ym).collect();
        let meter_fit = fit_quadratic(&xs_m, &ys_m).ok_or_else(underdetermined)?;

        let y_eval = (self.height - 1) as f64;
        let curvature_radius = radius_of_curvature(&meter_fit, y_eval * ym);

        let bottom_band = self.height - self.params.window_height(self.height);
        let base_x = pixels
            .mean_x_below(bottom_band)
            .unwrap_or_else(|| pixel_fit.eval(y_eval));

        Ok(SideFit {
            pixel_fit,
            meter_fit,
            curvature_radius,
            base_x,
        })
    }

    fn apply(&mut self, side: Side, pixels: PixelSet, failures: &mut Vec<TrackError>) {
        let outcome = self.fit_side(side, &pixels);
        let limit = self.params.degraded_frame_limit;
        let model = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        match outcome {
            Ok(fit) => model.accept(fit),
            Err(err) => {
                log::warn!("degraded frame: {err}");
                model.degrade(limit);
                failures.push(err);
            }
        }
        model.set_pixels(pixels.x, pixels.y);
    }
}

/// Advance `state` by one binary bird's-eye frame.
///
/// Uses local search when both sides are tracking and sliding windows
/// otherwise. Per-side failures keep the previous fit and are returned in
/// [`TrackOutput::failures`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = binary_warped.width, height = binary_warped.height))
)]
pub fn update(
    state: &mut LaneState,
    binary_warped: &GrayImageView<'_>,
) -> Result<TrackOutput, TrackError> {
    if binary_warped.width != state.width || binary_warped.height != state.height {
        return Err(TrackError::FrameSizeMismatch {
            width: state.width,
            height: state.height,
            got_width: binary_warped.width,
            got_height: binary_warped.height,
        });
    }

    let prior = if state.left.is_tracking() && state.right.is_tracking() {
        state.fits()
    } else {
        None
    };

    let margin = state.params.margin as f64;
    let (strategy, left, right, windows) = match prior {
        Some((left_fit, right_fit)) => {
            let (l, r) = local_search(binary_warped, &left_fit, &right_fit, margin);
            (SearchStrategy::Local, l, r, Vec::new())
        }
        None => {
            let res = sliding_window_search(binary_warped, &state.params);
            (SearchStrategy::SlidingWindow, res.left, res.right, res.windows)
        }
    };
    log::debug!(
        "{strategy:?}: {} left / {} right pixels",
        left.len(),
        right.len()
    );

    let mut failures = Vec::new();
    state.apply(Side::Left, left, &mut failures);
    state.apply(Side::Right, right, &mut failures);

    let left_px = PixelSet {
        x: state.left.pixel_x.clone(),
        y: state.left.pixel_y.clone(),
    };
    let right_px = PixelSet {
        x: state.right.pixel_x.clone(),
        y: state.right.pixel_y.clone(),
    };
    let search_image = match strategy {
        SearchStrategy::SlidingWindow => {
            render_sliding_windows(binary_warped, &windows, &left_px, &right_px)
        }
        SearchStrategy::Local => render_local_search(
            binary_warped,
            &left_px,
            &right_px,
            [
                (Side::Left, state.left.current_fit),
                (Side::Right, state.right.current_fit),
            ],
            margin,
        ),
    };

    Ok(TrackOutput {
        strategy,
        measurement: state.measurement(),
        failures,
        search_image,
        windows,
    })
}
