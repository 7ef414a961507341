//! Pixel collection strategies on a binary bird's-eye mask.
//!
//! Both strategies treat any nonzero mask value as a lane pixel.

use crate::boundary::Side;
use crate::polyfit::QuadraticFit;
use crate::TrackerParams;
use lanefind_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    SlidingWindow,
    Local,
}

/// Pixel coordinates attributed to one side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelSet {
    pub x: Vec<u32>,
    pub y: Vec<u32>,
}

impl PixelSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    fn push(&mut self, x: usize, y: usize) {
        self.x.push(x as u32);
        self.y.push(y as u32);
    }

    /// Mean x of the pixels with `y >= y_min`, if any.
    pub fn mean_x_below(&self, y_min: usize) -> Option<f64> {
        let (sum, n) = self
            .x
            .iter()
            .zip(&self.y)
            .filter(|&(_, &y)| y as usize >= y_min)
            .fold((0u64, 0u64), |(s, n), (&x, _)| (s + x as u64, n + 1));
        (n > 0).then(|| sum as f64 / n as f64)
    }
}

/// One sliding-window box, `[x_low, x_high) × [y_low, y_high)`.
///
/// `x_*` may extend past the frame; only in-frame pixels are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub side: Side,
    pub x_low: i64,
    pub x_high: i64,
    pub y_low: usize,
    pub y_high: usize,
}

#[derive(Clone, Debug, Default)]
pub struct SlidingWindowResult {
    pub left: PixelSet,
    pub right: PixelSet,
    pub windows: Vec<SearchWindow>,
}

/// Column sums of nonzero pixels over the bottom half of the mask.
pub fn bottom_half_histogram(mask: &GrayImageView<'_>) -> Vec<u32> {
    let mut hist = vec![0u32; mask.width];
    for y in mask.height / 2..mask.height {
        let row = &mask.data[y * mask.width..(y + 1) * mask.width];
        for (h, &v) in hist.iter_mut().zip(row) {
            if v != 0 {
                *h += 1;
            }
        }
    }
    hist
}

/// First argmax column left of `width / 2` and at or right of it.
pub fn histogram_bases(hist: &[u32]) -> (usize, usize) {
    let mid = hist.len() / 2;
    let argmax = |slice: &[u32]| {
        slice
            .iter()
            .enumerate()
            .fold((0usize, 0u32), |(bi, bv), (i, &v)| {
                if v > bv {
                    (i, v)
                } else {
                    (bi, bv)
                }
            })
            .0
    };
    (argmax(&hist[..mid]), mid + argmax(&hist[mid..]))
}

fn collect_window(
    mask: &GrayImageView<'_>,
    win: &SearchWindow,
    out: &mut PixelSet,
) -> (usize, u64) {
    let x0 = win.x_low.clamp(0, mask.width as i64) as usize;
    let x1 = win.x_high.clamp(0, mask.width as i64) as usize;
    let mut count = 0usize;
    let mut sum = 0u64;
    for y in win.y_low..win.y_high {
        let row = &mask.data[y * mask.width..(y + 1) * mask.width];
        for (x, &v) in row.iter().enumerate().take(x1).skip(x0) {
            if v != 0 {
                out.push(x, y);
                count += 1;
                sum += x as u64;
            }
        }
    }
    (count, sum)
}

/// Histogram-seeded search in `window_count` bands, bottom to top.
///
/// Each band collects the pixels inside `[x - margin, x + margin)` around
/// the current centre of each side; when a band collects more than
/// `min_recenter_pixels` the next band is centred on their truncated mean x.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(mask, params), fields(width = mask.width, height = mask.height))
)]
pub fn sliding_window_search(
    mask: &GrayImageView<'_>,
    params: &TrackerParams,
) -> SlidingWindowResult {
    let (left_base, right_base) = histogram_bases(&bottom_half_histogram(mask));
    let window_height = params.window_height(mask.height);
    let margin = params.margin as i64;

    let mut result = SlidingWindowResult::default();
    let mut current = [left_base as i64, right_base as i64];

    for band in 0..params.window_count {
        let y_high = mask.height - band * window_height;
        let y_low = y_high.saturating_sub(window_height);

        for (k, side) in [Side::Left, Side::Right].into_iter().enumerate() {
            let win = SearchWindow {
                side,
                x_low: current[k] - margin,
                x_high: current[k] + margin,
                y_low,
                y_high,
            };
            let pixels = match side {
                Side::Left => &mut result.left,
                Side::Right => &mut result.right,
            };
            let (count, sum) = collect_window(mask, &win, pixels);
            if count > params.min_recenter_pixels {
                current[k] = (sum / count as u64) as i64;
            }
            result.windows.push(win);
        }
    }

    log::debug!(
        "sliding windows: bases ({left_base}, {right_base}), {} left / {} right pixels",
        result.left.len(),
        result.right.len()
    );
    result
}

/// Pixels strictly inside `fit(y) ± margin`, row by row.
pub fn band_pixels(mask: &GrayImageView<'_>, fit: &QuadraticFit, margin: f64) -> PixelSet {
    let mut out = PixelSet::default();
    if mask.width == 0 {
        return out;
    }
    let max_x = (mask.width - 1) as f64;
    for y in 0..mask.height {
        let centre = fit.eval(y as f64);
        let lo = centre - margin;
        let hi = centre + margin;
        if !(hi > 0.0 && lo < max_x) {
            continue;
        }
        let x0 = lo.floor().max(0.0) as usize;
        let x1 = hi.ceil().min(max_x) as usize;
        let row = &mask.data[y * mask.width..(y + 1) * mask.width];
        for x in x0..=x1 {
            let xf = x as f64;
            if row[x] != 0 && xf > lo && xf < hi {
                out.push(x, y);
            }
        }
    }
    out
}

/// Search around both previous fits with the configured margin.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn local_search(
    mask: &GrayImageView<'_>,
    left_fit: &QuadraticFit,
    right_fit: &QuadraticFit,
    margin: f64,
) -> (PixelSet, PixelSet) {
    (
        band_pixels(mask, left_fit, margin),
        band_pixels(mask, right_fit, margin),
    )
}
