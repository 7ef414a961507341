//! Lane overlay and diagnostic panels.
//!
//! [`draw_lane`] fills the region between both fitted boundaries on a blank
//! bird's-eye canvas, maps it back into the camera view and adds it onto the
//! undistorted frame. [`Renderer::compose`] then draws a row of shaded boxes
//! across the top of the frame: the first carries curvature and offset text,
//! the next three show the thresholded mask, the warped mask and the search
//! visualization.

use crate::config::OverlayConfig;
use crate::font::{draw_text, text_width, GLYPH_H};
use lanefind_core::{resize_rgb, GrayImageView, PerspectiveMapper, RgbImage};
use lanefind_tracker::{LaneMeasurement, QuadraticFit};

#[cfg(feature = "tracing")]
use tracing::instrument;

pub const LANE_COLOR: [u8; 3] = [0, 255, 0];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_COLOR: [u8; 3] = [255, 255, 0];
/// Boxes narrower than this are not drawn.
const MIN_BOX_WIDTH: usize = 32;

/// Fill the lane between `left` and `right` and blend it onto `undistorted`.
///
/// `undistorted` must have the mapper's frame size; [`RgbImage::blend`]
/// panics otherwise.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = undistorted.width, height = undistorted.height))
)]
pub fn draw_lane(
    undistorted: &RgbImage,
    left: &QuadraticFit,
    right: &QuadraticFit,
    mapper: &PerspectiveMapper,
    blend: f32,
) -> RgbImage {
    let (w, h) = (mapper.width(), mapper.height());
    let mut canvas = RgbImage::new(w, h);
    for y in 0..h {
        let yf = y as f64;
        let (xl, xr) = (left.eval(yf), right.eval(yf));
        let (lo, hi) = if xl <= xr { (xl, xr) } else { (xr, xl) };
        if !lo.is_finite() || !hi.is_finite() || hi < 0.0 || lo > (w - 1) as f64 {
            continue;
        }
        let x0 = lo.round().max(0.0) as usize;
        let x1 = (hi.round() as usize).min(w - 1);
        for x in x0..=x1 {
            canvas.set(x, y, LANE_COLOR);
        }
    }

    let lane = mapper.unwarp_rgb(&canvas.view());
    let mut out = undistorted.clone();
    out.blend(&lane, 1.0, blend);
    out
}

/// Images shown in the diagnostic boxes, all at frame size.
#[derive(Clone, Copy, Debug)]
pub struct Panels<'a> {
    pub thresholded: GrayImageView<'a>,
    pub warped: GrayImageView<'a>,
    pub search: &'a RgbImage,
}

/// Overlay text for a measurement.
pub fn measurement_lines(measurement: Option<&LaneMeasurement>) -> [String; 2] {
    let Some(m) = measurement else {
        return ["CURVATURE : --".to_string(), "OFFSET : --".to_string()];
    };
    let curvature = if m.curvature_m.is_finite() {
        format!("CURVATURE : {:.2}M", m.curvature_m)
    } else {
        "CURVATURE : INF".to_string()
    };
    // Lane centre right of the frame centre puts the vehicle left of it.
    let side = if m.signed_offset_m > 0.0 {
        " L"
    } else if m.signed_offset_m < 0.0 {
        " R"
    } else {
        ""
    };
    [curvature, format!("OFFSET : {:.2}M{side}", m.offset_m)]
}

/// Box layout for one frame size.
#[derive(Clone, Debug)]
pub struct Renderer {
    width: usize,
    height: usize,
    shade: f32,
    offset: usize,
    box_width: usize,
    box_height: usize,
    boxes: Vec<(usize, usize)>,
}

impl Renderer {
    pub fn new(width: usize, height: usize, overlay: &OverlayConfig) -> Self {
        let n = overlay.box_count.max(1);
        let offset = overlay.box_offset;
        let box_width = width.saturating_sub((n + 1) * offset) / n;
        let box_height = if width == 0 {
            0
        } else {
            box_width * height / width + 2 * offset
        };
        let boxes = if box_width < MIN_BOX_WIDTH || box_height + offset > height {
            log::debug!("frame {width}x{height} too small for {n} overlay boxes");
            Vec::new()
        } else {
            (0..n).map(|k| (offset + k * (box_width + offset), offset)).collect()
        };
        Self {
            width,
            height,
            shade: overlay.box_shade,
            offset,
            box_width,
            box_height,
            boxes,
        }
    }

    /// Top-left corners of the boxes; empty when the frame is too small.
    pub fn boxes(&self) -> &[(usize, usize)] {
        &self.boxes
    }

    pub fn box_size(&self) -> (usize, usize) {
        (self.box_width, self.box_height)
    }

    fn text_scale(&self) -> usize {
        if self.box_width >= 240 {
            2
        } else {
            1
        }
    }

    /// Draw boxes, text and panels onto `frame` in place.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn compose(
        &self,
        frame: &mut RgbImage,
        measurement: Option<&LaneMeasurement>,
        panels: &Panels<'_>,
    ) {
        if self.boxes.is_empty() || frame.width != self.width || frame.height != self.height {
            return;
        }
        for &(x, y) in &self.boxes {
            frame.shade_rect(x, y, x + self.box_width, y + self.box_height, self.shade);
        }

        let scale = self.text_scale();
        let line_h = (GLYPH_H + 4) * scale;
        let (tx, ty) = self.boxes[0];
        for (i, line) in measurement_lines(measurement).iter().enumerate() {
            if text_width(line, scale) + 10 > self.box_width {
                draw_text(frame, (tx + 4) as i64, (ty + 10 + i * line_h) as i64, line, 1, TEXT_COLOR);
            } else {
                draw_text(frame, (tx + 10) as i64, (ty + 10 + i * line_h) as i64, line, scale, TEXT_COLOR);
            }
        }

        let panel_h = self.box_width * self.height / self.width;
        let images = [
            ("THRESHOLDED", panels.thresholded.to_owned().to_rgb()),
            ("TRANSFORMED", panels.warped.to_owned().to_rgb()),
            ("LINES DETECTED", panels.search.clone()),
        ];
        for (&(x, y), (label, img)) in self.boxes[1..].iter().zip(images) {
            let small = resize_rgb(&img.view(), self.box_width, panel_h);
            frame.paste(&small, x, y + self.offset);
            let label_y = y + self.offset.saturating_sub(GLYPH_H) / 2;
            draw_text(frame, (x + 2) as i64, label_y as i64, label, 1, LABEL_COLOR);
        }
    }
}
