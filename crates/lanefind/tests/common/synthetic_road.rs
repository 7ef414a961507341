use lanefind::core::{PerspectiveMapper, PerspectiveParams, RgbImage};
use nalgebra::Point2;

pub const W: usize = 640;
pub const H: usize = 360;
/// Bird's-eye x ranges `[start, end)` of the two painted lines.
pub const LEFT_LINE: (f64, f64) = (200.0, 212.0);
pub const RIGHT_LINE: (f64, f64) = (450.0, 462.0);
pub const ROAD: [u8; 3] = [100, 100, 100];
pub const PAINT: [u8; 3] = [255, 220, 0];

/// Lane centre minus frame centre in bird's-eye pixels.
pub fn expected_offset_px() -> f64 {
    let left = (LEFT_LINE.0 + LEFT_LINE.1 - 1.0) / 2.0;
    let right = (RIGHT_LINE.0 + RIGHT_LINE.1 - 1.0) / 2.0;
    (left + right) / 2.0 - W as f64 / 2.0
}

/// Camera view of a straight road whose lines are vertical in the
/// bird's-eye view of the default perspective mapping. Rows above the
/// source trapezoid are plain road.
pub fn straight_road() -> RgbImage {
    let params = PerspectiveParams::default();
    let mapper = PerspectiveMapper::new(W, H, &params).expect("mapper");
    let top = params.top_y * H as f64;
    let mut img = RgbImage::filled(W, H, ROAD);
    for y in 0..H {
        if (y as f64) < top {
            continue;
        }
        for x in 0..W {
            let b = mapper.to_birdseye(Point2::new(x as f64, y as f64));
            let on_line = |(x0, x1): (f64, f64)| b.x >= x0 && b.x < x1;
            if on_line(LEFT_LINE) || on_line(RIGHT_LINE) {
                img.set(x, y, PAINT);
            }
        }
    }
    img
}

pub fn blank_road() -> RgbImage {
    RgbImage::filled(W, H, ROAD)
}
