//! Core image buffers and geometry for lane perception.
//!
//! Everything here is frame-level and stateless: owned/borrowed 8-bit
//! buffers, bilinear sampling, planar homographies with warping, the
//! colour/gradient binarizer and the fixed bird's-eye perspective mapper.
//! Nothing in this crate depends on a concrete image-decoding library.

mod homography;
mod image;
mod logger;
pub mod perspective;
pub mod threshold;

pub use homography::{
    estimate_homography, estimate_homography_f64, homography_from_4pt, warp_perspective_gray,
    warp_perspective_rgb, Homography,
};
pub use image::{
    resize_rgb, sample_bilinear, sample_bilinear_rgb, sample_bilinear_u8, GrayImage,
    GrayImageView, RgbImage, RgbImageView,
};
pub use perspective::{PerspectiveError, PerspectiveMapper, PerspectiveParams, PerspectiveProfile};
pub use threshold::{threshold, ThresholdError, ThresholdParams};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
