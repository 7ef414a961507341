use crate::camera::CalibrationProfile;
use crate::error::CalibrationError;
use lanefind_core::{
    sample_bilinear_rgb, sample_bilinear_u8, GrayImage, GrayImageView, RgbImage, RgbImageView,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Precomputed source coordinates for every output pixel.
///
/// The output keeps the input camera matrix, so undistorted and distorted
/// frames share the same pixel scale.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    width: usize,
    height: usize,
    /// `None` when the profile has no distortion.
    map: Option<Vec<[f32; 2]>>,
}

impl UndistortMap {
    pub fn new(profile: &CalibrationProfile, width: usize, height: usize) -> Self {
        if profile.distortion.is_zero() {
            return Self {
                width,
                height,
                map: None,
            };
        }

        let (fx, fy, cx, cy) = (profile.fx(), profile.fy(), profile.cx(), profile.cy());
        let mut map = Vec::with_capacity(width * height);
        for v in 0..height {
            let y = (v as f64 - cy) / fy;
            for u in 0..width {
                let x = (u as f64 - cx) / fx;
                let src = profile.distort_normalized(x, y);
                map.push([src.x as f32, src.y as f32]);
            }
        }
        Self {
            width,
            height,
            map: Some(map),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.map.is_none()
    }

    fn check_size(&self, width: usize, height: usize) -> Result<(), CalibrationError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        log::warn!(
            "undistort map is {}x{}, frame is {width}x{height}",
            self.width,
            self.height
        );
        Err(CalibrationError::FrameSize {
            width: self.width,
            height: self.height,
            got_width: width,
            got_height: height,
        })
    }

    /// Undistort `frame`, which must have the size the map was built for.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn remap_rgb(&self, frame: &RgbImageView<'_>) -> Result<RgbImage, CalibrationError> {
        self.check_size(frame.width, frame.height)?;
        Ok(self.remap_rgb_unchecked(frame))
    }

    pub fn remap_gray(&self, frame: &GrayImageView<'_>) -> Result<GrayImage, CalibrationError> {
        self.check_size(frame.width, frame.height)?;
        Ok(self.remap_gray_unchecked(frame))
    }

    fn remap_rgb_unchecked(&self, frame: &RgbImageView<'_>) -> RgbImage {
        let Some(map) = &self.map else {
            return frame.to_owned();
        };
        let mut out = RgbImage::new(self.width, self.height);
        for (i, &[sx, sy]) in map.iter().enumerate() {
            out.set(i % self.width, i / self.width, sample_bilinear_rgb(frame, sx, sy));
        }
        out
    }

    fn remap_gray_unchecked(&self, frame: &GrayImageView<'_>) -> GrayImage {
        let Some(map) = &self.map else {
            return frame.to_owned();
        };
        let mut out = GrayImage::new(self.width, self.height);
        for (i, &[sx, sy]) in map.iter().enumerate() {
            out.set(i % self.width, i / self.width, sample_bilinear_u8(frame, sx, sy));
        }
        out
    }
}

/// Remove lens distortion from an RGB frame.
///
/// Same shape as the input; a distortion-free profile returns an exact copy.
pub fn undistort_rgb(frame: &RgbImageView<'_>, profile: &CalibrationProfile) -> RgbImage {
    UndistortMap::new(profile, frame.width, frame.height).remap_rgb_unchecked(frame)
}

pub fn undistort_gray(frame: &GrayImageView<'_>, profile: &CalibrationProfile) -> GrayImage {
    UndistortMap::new(profile, frame.width, frame.height).remap_gray_unchecked(frame)
}
