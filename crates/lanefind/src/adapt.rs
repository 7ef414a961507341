//! Conversions between `image` crate buffers and the `lanefind-core` types.

use crate::core;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the buffer adapters.
#[derive(thiserror::Error, Debug)]
pub enum AdaptError {
    #[error("invalid RGB image buffer length (expected {expected} bytes, got {got})")]
    InvalidRgbBuffer { expected: usize, got: usize },

    #[error("invalid RGB image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

/// Borrow an `image::GrayImage` as a `lanefind-core` view.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Borrow an `image::RgbImage` as a `lanefind-core` view.
pub fn rgb_view(img: &::image::RgbImage) -> core::RgbImageView<'_> {
    core::RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn from_image_rgb(img: ::image::RgbImage) -> core::RgbImage {
    let (width, height) = (img.width() as usize, img.height() as usize);
    core::RgbImage {
        width,
        height,
        data: img.into_raw(),
    }
}

pub fn to_image_rgb(img: &core::RgbImage) -> Result<::image::RgbImage, AdaptError> {
    let (width, height) = dimensions_u32(img.width, img.height)?;
    rgb_image_from_slice(width, height, &img.data)
}

pub fn to_image_gray(img: &core::GrayImage) -> Result<::image::GrayImage, AdaptError> {
    let (width, height) = dimensions_u32(img.width, img.height)?;
    ::image::GrayImage::from_raw(width, height, img.data.clone())
        .ok_or(AdaptError::InvalidDimensions { width, height })
}

fn dimensions_u32(width: usize, height: usize) -> Result<(u32, u32), AdaptError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(AdaptError::InvalidDimensions {
            width: u32::MAX,
            height: u32::MAX,
        }),
    }
}

/// Build an `image::RgbImage` from a raw interleaved RGB buffer.
pub fn rgb_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::RgbImage, AdaptError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(AdaptError::InvalidDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h).and_then(|n| n.checked_mul(3)) else {
        return Err(AdaptError::InvalidDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(AdaptError::InvalidRgbBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::RgbImage::from_raw(width, height, pixels.to_vec())
        .ok_or(AdaptError::InvalidDimensions { width, height })
}

/// Decode any supported image file into an RGB frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))
)]
pub fn load_rgb(path: impl AsRef<Path>) -> Result<core::RgbImage, AdaptError> {
    let img = ::image::open(path.as_ref())?.to_rgb8();
    Ok(from_image_rgb(img))
}

/// Decode any supported image file into a grayscale frame.
pub fn load_gray(path: impl AsRef<Path>) -> Result<core::GrayImage, AdaptError> {
    let img = ::image::open(path.as_ref())?.to_luma8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    Ok(core::GrayImage {
        width,
        height,
        data: img.into_raw(),
    })
}

/// Encode `img`; the format follows the file extension.
pub fn save_rgb(img: &core::RgbImage, path: impl AsRef<Path>) -> Result<(), AdaptError> {
    to_image_rgb(img)?.save(path.as_ref())?;
    Ok(())
}
