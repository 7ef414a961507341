//! Fixed camera ↔ bird's-eye perspective mapping.
//!
//! The source quadrilateral is a trapezoid over the road ahead, expressed as
//! fractions of the frame size so one parameter set serves any resolution.
//! The destination is the full output rectangle, which makes parallel lane
//! lines appear vertical after warping.

use crate::homography::{homography_from_4pt, warp_perspective_gray, warp_perspective_rgb};
use crate::{GrayImage, GrayImageView, Homography, RgbImage, RgbImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PerspectiveError {
    #[error("frame size {width}x{height} is too small for a perspective mapping")]
    InvalidFrameSize { width: usize, height: usize },
    #[error("invalid perspective parameters: {0}")]
    InvalidParams(&'static str),
    #[error("source quadrilateral is degenerate")]
    DegenerateQuad,
}

/// Source trapezoid, as fractions of frame width (`*_x`) and height (`*_y`).
///
/// Defaults reproduce the quad tuned on 1280×720 road footage:
/// `(546,450) (732,450) (1280,710) (0,710)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveParams {
    pub top_left_x: f64,
    pub top_right_x: f64,
    pub top_y: f64,
    pub bottom_left_x: f64,
    pub bottom_right_x: f64,
    pub bottom_y: f64,
}

impl Default for PerspectiveParams {
    fn default() -> Self {
        Self {
            top_left_x: 546.0 / 1280.0,
            top_right_x: 732.0 / 1280.0,
            top_y: 450.0 / 720.0,
            bottom_left_x: 0.0,
            bottom_right_x: 1.0,
            bottom_y: 710.0 / 720.0,
        }
    }
}

impl PerspectiveParams {
    pub fn validate(&self) -> Result<(), PerspectiveError> {
        let all = [
            self.top_left_x,
            self.top_right_x,
            self.top_y,
            self.bottom_left_x,
            self.bottom_right_x,
            self.bottom_y,
        ];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0) {
            return Err(PerspectiveError::InvalidParams(
                "fractions must lie in [0, 1]",
            ));
        }
        if self.top_left_x >= self.top_right_x || self.bottom_left_x >= self.bottom_right_x {
            return Err(PerspectiveError::InvalidParams(
                "left corners must lie left of right corners",
            ));
        }
        if self.top_y >= self.bottom_y {
            return Err(PerspectiveError::InvalidParams(
                "top edge must lie above bottom edge",
            ));
        }
        Ok(())
    }

    /// Source corners in pixels: top-left, top-right, bottom-right, bottom-left.
    pub fn source_quad(&self, width: usize, height: usize) -> [Point2<f32>; 4] {
        let w = width as f64;
        let h = height as f64;
        [
            Point2::new((self.top_left_x * w) as f32, (self.top_y * h) as f32),
            Point2::new((self.top_right_x * w) as f32, (self.top_y * h) as f32),
            Point2::new((self.bottom_right_x * w) as f32, (self.bottom_y * h) as f32),
            Point2::new((self.bottom_left_x * w) as f32, (self.bottom_y * h) as f32),
        ]
    }
}

/// Forward and inverse homographies for one frame geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveProfile {
    /// Camera → bird's-eye.
    pub forward: Homography,
    /// Bird's-eye → camera.
    pub inverse: Homography,
    pub width: usize,
    pub height: usize,
    pub source: [[f32; 2]; 4],
    pub destination: [[f32; 2]; 4],
}

/// Applies a [`PerspectiveProfile`]; immutable once built.
#[derive(Clone, Debug)]
pub struct PerspectiveMapper {
    profile: PerspectiveProfile,
}

impl PerspectiveMapper {
    pub fn new(
        width: usize,
        height: usize,
        params: &PerspectiveParams,
    ) -> Result<Self, PerspectiveError> {
        if width < 2 || height < 2 {
            return Err(PerspectiveError::InvalidFrameSize { width, height });
        }
        params.validate()?;

        let src = params.source_quad(width, height);
        let (w, h) = (width as f32, height as f32);
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];

        let forward = homography_from_4pt(&src, &dst).ok_or(PerspectiveError::DegenerateQuad)?;
        let inverse = forward.inverse().ok_or(PerspectiveError::DegenerateQuad)?;
        log::debug!("perspective mapper {width}x{height}, source quad {src:?}");

        Ok(Self {
            profile: PerspectiveProfile {
                forward,
                inverse,
                width,
                height,
                source: src.map(|p| [p.x, p.y]),
                destination: dst.map(|p| [p.x, p.y]),
            },
        })
    }

    pub fn profile(&self) -> &PerspectiveProfile {
        &self.profile
    }

    pub fn width(&self) -> usize {
        self.profile.width
    }

    pub fn height(&self) -> usize {
        self.profile.height
    }

    pub fn to_birdseye(&self, p: Point2<f64>) -> Point2<f64> {
        self.profile.forward.apply_f64(p)
    }

    pub fn to_camera(&self, p: Point2<f64>) -> Point2<f64> {
        self.profile.inverse.apply_f64(p)
    }

    pub fn warp_gray(&self, frame: &GrayImageView<'_>) -> GrayImage {
        warp_perspective_gray(frame, self.profile.inverse, self.width(), self.height())
    }

    pub fn warp_rgb(&self, frame: &RgbImageView<'_>) -> RgbImage {
        warp_perspective_rgb(frame, self.profile.inverse, self.width(), self.height())
    }

    pub fn unwarp_gray(&self, birdseye: &GrayImageView<'_>) -> GrayImage {
        warp_perspective_gray(birdseye, self.profile.forward, self.width(), self.height())
    }

    pub fn unwarp_rgb(&self, birdseye: &RgbImageView<'_>) -> RgbImage {
        warp_perspective_rgb(birdseye, self.profile.forward, self.width(), self.height())
    }
}
