//! Diagnostic rendering of a tracker step on the bird's-eye mask.

use crate::boundary::Side;
use crate::polyfit::QuadraticFit;
use crate::search::{PixelSet, SearchWindow};
use lanefind_core::{GrayImageView, RgbImage};

pub const LEFT_COLOR: [u8; 3] = [255, 0, 0];
pub const RIGHT_COLOR: [u8; 3] = [0, 0, 255];
pub const WINDOW_COLOR: [u8; 3] = [0, 255, 0];
const BAND_WEIGHT: f32 = 0.3;

fn side_color(side: Side) -> [u8; 3] {
    match side {
        Side::Left => LEFT_COLOR,
        Side::Right => RIGHT_COLOR,
    }
}

/// Mask replicated into three channels.
pub fn mask_to_rgb(mask: &GrayImageView<'_>) -> RgbImage {
    mask.to_owned().to_rgb()
}

pub fn color_pixels(img: &mut RgbImage, pixels: &PixelSet, rgb: [u8; 3]) {
    for (&x, &y) in pixels.x.iter().zip(&pixels.y) {
        img.put(x as i64, y as i64, rgb);
    }
}

pub fn draw_windows(img: &mut RgbImage, windows: &[SearchWindow]) {
    for w in windows {
        img.draw_rect(
            w.x_low,
            w.y_low as i64,
            w.x_high,
            w.y_high as i64,
            WINDOW_COLOR,
            2,
        );
    }
}

/// Fill the open band `fit(y) ± margin` of every row with `rgb`.
pub fn fill_band(img: &mut RgbImage, fit: &QuadraticFit, margin: f64, rgb: [u8; 3]) {
    for y in 0..img.height {
        let centre = fit.eval(y as f64);
        let x0 = (centre - margin).ceil() as i64;
        let x1 = (centre + margin).floor() as i64;
        for x in x0..=x1 {
            img.put(x, y as i64, rgb);
        }
    }
}

/// Sliding-window step: windows in green, left pixels red, right blue.
pub fn render_sliding_windows(
    mask: &GrayImageView<'_>,
    windows: &[SearchWindow],
    left: &PixelSet,
    right: &PixelSet,
) -> RgbImage {
    let mut out = mask_to_rgb(mask);
    draw_windows(&mut out, windows);
    color_pixels(&mut out, left, LEFT_COLOR);
    color_pixels(&mut out, right, RIGHT_COLOR);
    out
}

/// Local-search step: coloured pixels with the search bands tinted on top.
pub fn render_local_search(
    mask: &GrayImageView<'_>,
    left: &PixelSet,
    right: &PixelSet,
    bands: [(Side, Option<QuadraticFit>); 2],
    margin: f64,
) -> RgbImage {
    let mut out = mask_to_rgb(mask);
    color_pixels(&mut out, left, LEFT_COLOR);
    color_pixels(&mut out, right, RIGHT_COLOR);

    let mut overlay = RgbImage::new(out.width, out.height);
    for (side, fit) in bands {
        if let Some(fit) = fit {
            fill_band(&mut overlay, &fit, margin, side_color(side));
        }
    }
    out.blend(&overlay, 1.0, BAND_WEIGHT);
    out
}
