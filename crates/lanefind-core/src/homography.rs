use crate::{sample_bilinear_rgb, sample_bilinear_u8, GrayImage, GrayImageView, RgbImage, RgbImageView};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Planar projective transform acting on homogeneous pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self {
            h: Matrix3::identity(),
        }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    /// Double-precision variant of [`Homography::apply`].
    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity moving `pts` to zero centroid and RMS radius √2.
///
/// `None` when every point coincides.
fn conditioning(pts: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = pts.len() as f64;
    let centroid = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let spread = pts
        .iter()
        .map(|p| (p.coords - centroid).norm_squared())
        .sum::<f64>()
        / n;
    if spread < 1e-18 {
        return None;
    }
    let s = (2.0 / spread).sqrt();
    Some(Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}

fn transform(m: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    Point2::new(v.x / v.z, v.y / v.z)
}

/// Projective map `dst ~ H * src` from at least four correspondences.
///
/// Both point sets are conditioned, the two linear constraints of every
/// pair are accumulated into the 9x9 normal matrix and `H` is its
/// eigenvector of least eigenvalue. Returns `None` for mismatched or short
/// inputs and for configurations that do not pin `H` down (coincident or
/// collinear points).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, dst), fields(points = src.len()))
)]
pub fn estimate_homography_f64(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    let t_src = conditioning(src)?;
    let t_dst = conditioning(dst)?;

    let mut normal = SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let s = transform(&t_src, s);
        let d = transform(&t_dst, d);
        let rx = SVector::<f64, 9>::from_column_slice(&[
            s.x, s.y, 1.0, 0.0, 0.0, 0.0, -d.x * s.x, -d.x * s.y, -d.x,
        ]);
        let ry = SVector::<f64, 9>::from_column_slice(&[
            0.0, 0.0, 0.0, s.x, s.y, 1.0, -d.y * s.x, -d.y * s.y, -d.y,
        ]);
        normal += rx * rx.transpose() + ry * ry.transpose();
    }

    let eigen = normal.symmetric_eigen();
    let mut order: Vec<usize> = (0..9).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let largest = eigen.eigenvalues[order[8]];
    // A second near-zero eigenvalue leaves a family of solutions.
    if eigen.eigenvalues[order[1]] <= 1e-10 * largest {
        return None;
    }

    let h = eigen.eigenvectors.column(order[0]);
    let conditioned = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    if conditioned.determinant().abs() < 1e-9 {
        return None;
    }
    let h = t_dst.try_inverse()? * conditioned * t_src;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / scale))
}

/// Single-precision front end of [`estimate_homography_f64`].
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    let widen = |pts: &[Point2<f32>]| pts.iter().map(|p| p.cast::<f64>()).collect::<Vec<_>>();
    estimate_homography_f64(&widen(src), &widen(dst))
}

/// Homography taking quad `src` onto quad `dst`, corners in matching order.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    estimate_homography_f64(&src.map(|p| p.cast::<f64>()), &dst.map(|p| p.cast::<f64>()))
}

/// Resample `src` into an `out_w × out_h` grid: each output pixel `p` reads
/// `src` at `h_src_from_dst(p)`.
///
/// Pixel centres sit on integer coordinates, so a pure translation by whole
/// pixels copies values exactly.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = vec![0u8; out_w * out_h];

    for y in 0..out_h {
        for x in 0..out_w {
            let ps = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            out[y * out_w + x] = sample_bilinear_u8(src, ps.x, ps.y);
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    }
}

/// RGB counterpart of [`warp_perspective_gray`].
pub fn warp_perspective_rgb(
    src: &RgbImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
) -> RgbImage {
    let mut out = RgbImage::new(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            let ps = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            out.set(x, y, sample_bilinear_rgb(src, ps.x, ps.y));
        }
    }

    out
}
