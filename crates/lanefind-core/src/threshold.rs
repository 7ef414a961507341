//! Colour + gradient binarization of lane markings.
//!
//! The frame is converted to HLS; the lightness channel feeds a horizontal
//! Sobel gradient and the saturation channel feeds a colour mask. A pixel is
//! marked (255) when either value lies inside its inclusive range.

use crate::{GrayImage, RgbImageView};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("{name} threshold range is empty (min {min} > max {max})")]
    EmptyRange { name: &'static str, min: u8, max: u8 },
}

/// Inclusive `[min, max]` threshold ranges on 8-bit values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Range on the HLS saturation channel.
    pub color: [u8; 2],
    /// Range on the 8-bit scaled |Sobel x| of the lightness channel.
    pub gradient: [u8; 2],
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            color: [170, 255],
            gradient: [20, 100],
        }
    }
}

impl ThresholdParams {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (name, [min, max]) in [("color", self.color), ("gradient", self.gradient)] {
            if min > max {
                return Err(ThresholdError::EmptyRange { name, min, max });
            }
        }
        Ok(())
    }
}

/// Lightness and saturation channels of an RGB frame (OpenCV 8-bit HLS scale).
pub fn hls_lightness_saturation(frame: &RgbImageView<'_>) -> (GrayImage, GrayImage) {
    let mut light = GrayImage::new(frame.width, frame.height);
    let mut sat = GrayImage::new(frame.width, frame.height);

    for (i, px) in frame.data.chunks_exact(3).enumerate() {
        let r = px[0] as f32 / 255.0;
        let g = px[1] as f32 / 255.0;
        let b = px[2] as f32 / 255.0;
        let vmax = r.max(g).max(b);
        let vmin = r.min(g).min(b);
        let l = (vmax + vmin) * 0.5;
        let diff = vmax - vmin;
        let s = if diff <= f32::EPSILON {
            0.0
        } else if l < 0.5 {
            diff / (vmax + vmin)
        } else {
            diff / (2.0 - vmax - vmin)
        };
        light.data[i] = (l * 255.0).round().clamp(0.0, 255.0) as u8;
        sat.data[i] = (s * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    (light, sat)
}

#[inline]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * n - 2 - i;
    }
    i as usize
}

/// |d/dx| of a 3×3 Sobel kernel with reflect-101 borders.
pub fn sobel_x_abs(src: &GrayImage) -> Vec<f32> {
    let (w, h) = (src.width, src.height);
    let mut out = vec![0.0f32; w * h];
    if w == 0 || h == 0 {
        return out;
    }
    for y in 0..h {
        let ym = reflect101(y as isize - 1, h);
        let yp = reflect101(y as isize + 1, h);
        for x in 0..w {
            let xm = reflect101(x as isize - 1, w);
            let xp = reflect101(x as isize + 1, w);
            let col = |xx: usize| -> f32 {
                src.get(xx, ym) as f32 + 2.0 * src.get(xx, y) as f32 + src.get(xx, yp) as f32
            };
            out[y * w + x] = (col(xp) - col(xm)).abs();
        }
    }
    out
}

/// Binary lane-marking mask with values in {0, 255}.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(frame, params), fields(width = frame.width, height = frame.height))
)]
pub fn threshold(frame: &RgbImageView<'_>, params: &ThresholdParams) -> GrayImage {
    let (light, sat) = hls_lightness_saturation(frame);
    let grad = sobel_x_abs(&light);
    let max_grad = grad.iter().copied().fold(0.0f32, f32::max);

    let [gmin, gmax] = params.gradient;
    let [cmin, cmax] = params.color;

    let mut out = GrayImage::new(frame.width, frame.height);
    for (i, o) in out.data.iter_mut().enumerate() {
        let grad_hit = max_grad > 0.0 && {
            let scaled = (255.0 * grad[i] / max_grad) as u8;
            scaled >= gmin && scaled <= gmax
        };
        let s = sat.data[i];
        let color_hit = s >= cmin && s <= cmax;
        if grad_hit || color_hit {
            *o = 255;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RgbImage;

    #[test]
    fn hls_of_primary_and_gray_colours() {
        let mut img = RgbImage::new(3, 1);
        img.set(0, 0, [255, 255, 0]);
        img.set(1, 0, [100, 100, 100]);
        img.set(2, 0, [0, 0, 0]);
        let (l, s) = hls_lightness_saturation(&img.view());
        assert_eq!(l.data, vec![128, 100, 0]);
        assert_eq!(s.data, vec![255, 0, 0]);
    }

    #[test]
    fn saturated_pixels_pass_colour_range() {
        let mut img = RgbImage::filled(8, 8, [90, 90, 90]);
        img.set(3, 3, [250, 200, 0]);
        let mask = threshold(&img.view(), &ThresholdParams::default());
        assert_eq!(mask.get(3, 3), 255);
        assert_eq!(mask.get(0, 7), 0);
    }

    #[test]
    fn vertical_edge_is_detected_by_gradient() {
        let mut img = RgbImage::filled(10, 6, [40, 40, 40]);
        for y in 0..6 {
            for x in 5..10 {
                img.set(x, y, [200, 200, 200]);
            }
        }
        let params = ThresholdParams {
            color: [255, 255],
            gradient: [200, 255],
        };
        let mask = threshold(&img.view(), &params);
        for y in 0..6 {
            assert_eq!(mask.get(4, y), 255);
            assert_eq!(mask.get(5, y), 255);
            assert_eq!(mask.get(1, y), 0);
            assert_eq!(mask.get(8, y), 0);
        }
    }

    #[test]
    fn uniform_frame_yields_empty_mask() {
        let img = RgbImage::filled(5, 5, [120, 120, 120]);
        let mask = threshold(&img.view(), &ThresholdParams::default());
        assert!(mask.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let params = ThresholdParams {
            color: [200, 100],
            ..ThresholdParams::default()
        };
        assert_eq!(
            params.validate(),
            Err(ThresholdError::EmptyRange {
                name: "color",
                min: 200,
                max: 100
            })
        );
    }
}
