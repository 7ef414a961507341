use lanefind_calib::CalibrationProfile;
use lanefind_core::GrayImage;
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

pub const COLS: usize = 9;
pub const ROWS: usize = 6;

pub type Pose = (Rotation3<f64>, Vector3<f64>);

/// Pose placing the board centre on the optical axis at `depth` square units.
pub fn board_pose(rx: f64, ry: f64, rz: f64, depth: f64) -> Pose {
    let rot = Rotation3::from_euler_angles(rx, ry, rz);
    let centre = rot * Vector3::new((COLS - 1) as f64 * 0.5, (ROWS - 1) as f64 * 0.5, 0.0);
    (rot, Vector3::new(-centre.x, -centre.y, depth))
}

/// Undistort a normalized coordinate by fixed-point iteration.
fn undistort_normalized(camera: &CalibrationProfile, xd: f64, yd: f64) -> (f64, f64) {
    let (mut x, mut y) = (xd, yd);
    for _ in 0..20 {
        let (px, py) = camera.distortion.apply(x, y);
        x += xd - px;
        y += yd - py;
    }
    (x, y)
}

/// Board intensity at board-plane coordinates (square units).
///
/// Inner corner `(c, r)` sits at `(c, r)`; the board has one extra square on
/// each side, then a one-square white margin over a gray background.
fn board_value(bx: f64, by: f64) -> f64 {
    let (x0, y0) = (-1.0, -1.0);
    let (x1, y1) = (COLS as f64, ROWS as f64);
    if bx >= x0 && bx < x1 && by >= y0 && by < y1 {
        let parity = (bx.floor() as i64 + by.floor() as i64).rem_euclid(2);
        if parity == 0 {
            25.0
        } else {
            230.0
        }
    } else if bx >= x0 - 1.0 && bx < x1 + 1.0 && by >= y0 - 1.0 && by < y1 + 1.0 {
        230.0
    } else {
        128.0
    }
}

/// Render the board seen by `camera` (distortion included), 2x2 supersampled.
pub fn render_board(camera: &CalibrationProfile, pose: &Pose, width: usize, height: usize) -> GrayImage {
    let (rot, t) = pose;
    let m = Matrix3::from_columns(&[
        rot.matrix().column(0).into_owned(),
        rot.matrix().column(1).into_owned(),
        *t,
    ]);
    let m_inv = m.try_inverse().expect("board plane through camera centre");

    let mut img = GrayImage::new(width, height);
    for v in 0..height {
        for u in 0..width {
            let mut acc = 0.0;
            for (du, dv) in [(-0.25, -0.25), (0.25, -0.25), (-0.25, 0.25), (0.25, 0.25)] {
                let xd = (u as f64 + du - camera.cx()) / camera.fx();
                let yd = (v as f64 + dv - camera.cy()) / camera.fy();
                let (x, y) = undistort_normalized(camera, xd, yd);
                let b = m_inv * Vector3::new(x, y, 1.0);
                acc += if b.z.abs() < 1e-12 {
                    128.0
                } else {
                    board_value(b.x / b.z, b.y / b.z)
                };
            }
            img.set(u, v, (acc / 4.0).round() as u8);
        }
    }
    img
}

/// Ground-truth image positions of the inner corners, row-major.
pub fn project_corners(camera: &CalibrationProfile, pose: &Pose) -> Vec<Point2<f64>> {
    let (rot, t) = pose;
    (0..ROWS)
        .flat_map(|r| (0..COLS).map(move |c| Point3::new(c as f64, r as f64, 0.0)))
        .map(|p| camera.project(rot, t, &p).expect("corner in front of camera"))
        .collect()
}
