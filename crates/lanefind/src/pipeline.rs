//! Per-frame lane pipeline.
//!
//! `undistort → threshold → warp → track → draw lane → overlays`. Everything
//! except the [`LaneState`] is fixed at construction; frames must arrive in
//! order through `&mut self`.

use crate::config::{ConfigError, LaneConfig};
use crate::render::{draw_lane, Panels, Renderer};
use lanefind_calib::{CalibrationError, CalibrationProfile, UndistortMap};
use lanefind_core::{threshold, GrayImage, PerspectiveError, PerspectiveMapper, RgbImage, RgbImageView};
use lanefind_tracker::{LaneMeasurement, LaneState, SearchStrategy, Side, TrackError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Warped mask values at or above this count as lane pixels.
const WARPED_MASK_LEVEL: u8 = 128;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Perspective(#[from] PerspectiveError),
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    Undistort(#[from] CalibrationError),
    #[error("frame is {got_width}x{got_height}, pipeline was built for {width}x{height}")]
    FrameSize {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    #[error("calibration profile is for {profile_width}x{profile_height}, frames are {width}x{height}")]
    ProfileSize {
        width: usize,
        height: usize,
        profile_width: usize,
        profile_height: usize,
    },
}

/// Output of one [`LanePipeline::process_frame`] call.
#[derive(Clone, Debug)]
pub struct FrameResult {
    /// Zero-based position of the frame in this pipeline's sequence.
    pub index: usize,
    pub image: RgbImage,
    /// `None` until both boundaries have been fitted.
    pub measurement: Option<LaneMeasurement>,
    pub strategy: SearchStrategy,
    /// Sides whose search failed this frame and kept their previous fit.
    pub degraded: Vec<Side>,
}

pub struct LanePipeline {
    config: LaneConfig,
    undistort: UndistortMap,
    mapper: PerspectiveMapper,
    state: LaneState,
    renderer: Renderer,
    width: usize,
    height: usize,
    frames: usize,
}

impl LanePipeline {
    /// Validate `config` and build every stage for `width × height` frames.
    pub fn new(
        config: LaneConfig,
        profile: &CalibrationProfile,
        width: usize,
        height: usize,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let (profile_width, profile_height) = profile.image_size;
        if (profile_width, profile_height) != (width, height) {
            return Err(PipelineError::ProfileSize {
                width,
                height,
                profile_width,
                profile_height,
            });
        }

        let mapper = PerspectiveMapper::new(width, height, &config.perspective)?;
        let state =
            LaneState::new(width, height, config.tracker.clone()).map_err(ConfigError::from)?;
        let undistort = UndistortMap::new(profile, width, height);
        let renderer = Renderer::new(width, height, &config.overlay);
        log::info!(
            "lane pipeline {width}x{height} (undistort: {}, overlay: {})",
            !undistort.is_identity(),
            config.overlay.enabled
        );

        Ok(Self {
            config,
            undistort,
            mapper,
            state,
            renderer,
            width,
            height,
            frames: 0,
        })
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    pub fn mapper(&self) -> &PerspectiveMapper {
        &self.mapper
    }

    pub fn state(&self) -> &LaneState {
        &self.state
    }

    pub fn frames_processed(&self) -> usize {
        self.frames
    }

    /// Drop both boundaries back to sliding-window acquisition.
    pub fn reset(&mut self) {
        self.state.force_reacquire();
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(index = self.frames))
    )]
    pub fn process_frame(&mut self, frame: &RgbImageView<'_>) -> Result<FrameResult, PipelineError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(PipelineError::FrameSize {
                width: self.width,
                height: self.height,
                got_width: frame.width,
                got_height: frame.height,
            });
        }

        let undistorted = self.undistort.remap_rgb(frame)?;
        let mask = threshold(&undistorted.view(), &self.config.threshold);
        let warped = binarize(self.mapper.warp_gray(&mask.view()));
        let track = self.state.update(&warped.view())?;

        // The overlay follows the recent-frame average; measurements use the
        // current fits.
        let mut image = match self.state.smoothed_fits() {
            Some((left, right)) => draw_lane(
                &undistorted,
                &left,
                &right,
                &self.mapper,
                self.config.overlay.lane_blend,
            ),
            None => undistorted,
        };
        if self.config.overlay.enabled {
            let panels = Panels {
                thresholded: mask.view(),
                warped: warped.view(),
                search: &track.search_image,
            };
            self.renderer
                .compose(&mut image, track.measurement.as_ref(), &panels);
        }

        let index = self.frames;
        self.frames += 1;
        let degraded = track.degraded_sides();
        match &track.measurement {
            Some(m) => log::debug!(
                "frame {index}: {:?}, curvature {:.1} m, offset {:.3} m",
                track.strategy,
                m.curvature_m,
                m.signed_offset_m
            ),
            None => log::debug!("frame {index}: {:?}, no lane yet", track.strategy),
        }

        Ok(FrameResult {
            index,
            image,
            measurement: track.measurement,
            strategy: track.strategy,
            degraded,
        })
    }
}

/// Bilinear warping blurs mask edges; snap them back to {0, 255}.
fn binarize(mut mask: GrayImage) -> GrayImage {
    for v in &mut mask.data {
        *v = if *v >= WARPED_MASK_LEVEL { 255 } else { 0 };
    }
    mask
}
