use crate::camera::{CalibrationProfile, Distortion};
use crate::detector::{detect_chessboard, ChessboardCorners};
use crate::error::CalibrationError;
use crate::optimize::{levenberg_marquardt, LmOptions};
use crate::params::ChessboardParams;
use lanefind_core::{estimate_homography_f64, GrayImageView};
use log::{debug, info, warn};
use nalgebra::{
    DVector, Matrix2, Matrix3, Matrix6, Point2, Point3, Rotation3, SymmetricEigen, Vector2, Vector3,
    Vector6,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Object/image point pairs, one entry per accepted board view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationCorrespondences {
    /// `[cols, rows]` inner corners.
    pub pattern: [usize; 2],
    pub object_points: Vec<Vec<Point3<f64>>>,
    pub image_points: Vec<Vec<Point2<f32>>>,
}

impl CalibrationCorrespondences {
    pub fn new(pattern: [usize; 2]) -> Self {
        Self {
            pattern,
            object_points: Vec::new(),
            image_points: Vec::new(),
        }
    }

    /// Board-plane coordinates in square units, row-major: `(col, row, 0)`.
    pub fn board_points(pattern: [usize; 2]) -> Vec<Point3<f64>> {
        let [cols, rows] = pattern;
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| Point3::new(c as f64, r as f64, 0.0)))
            .collect()
    }

    pub fn add_view(&mut self, corners: &ChessboardCorners) -> Result<(), CalibrationError> {
        let got = [corners.cols, corners.rows];
        if got != self.pattern || corners.points.len() != got[0] * got[1] {
            return Err(CalibrationError::PatternMismatch {
                expected: self.pattern,
                got,
            });
        }
        self.object_points.push(Self::board_points(self.pattern));
        self.image_points.push(corners.points.clone());
        Ok(())
    }

    pub fn views(&self) -> usize {
        self.image_points.len()
    }

    /// Detect the board in every image; images without a complete board are
    /// skipped with a warning.
    pub fn collect<'a, I>(images: I, params: &ChessboardParams) -> Result<Self, CalibrationError>
    where
        I: IntoIterator<Item = GrayImageView<'a>>,
    {
        let mut corr = Self::new(params.pattern());
        let mut tried = 0usize;
        for (idx, img) in images.into_iter().enumerate() {
            tried += 1;
            match detect_chessboard(&img, params) {
                Some(corners) => {
                    corr.add_view(&corners)?;
                    debug!("calibration image {idx}: board found");
                }
                None => warn!(
                    "calibration image {idx}: no {}x{} chessboard, skipped",
                    params.cols, params.rows
                ),
            }
        }
        if corr.views() == 0 {
            return Err(CalibrationError::NoUsableImages { tried });
        }
        info!("chessboard found in {}/{} calibration images", corr.views(), tried);
        Ok(corr)
    }
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    [
        h[(0, i)] * h[(0, j)],
        h[(0, i)] * h[(1, j)] + h[(1, i)] * h[(0, j)],
        h[(1, i)] * h[(1, j)],
        h[(2, i)] * h[(0, j)] + h[(0, i)] * h[(2, j)],
        h[(2, i)] * h[(1, j)] + h[(1, i)] * h[(2, j)],
        h[(2, i)] * h[(2, j)],
    ]
}

/// Zero-skew closed form from ≥3 homographies (in normalized pixel units).
fn zhang_intrinsics(hs: &[Matrix3<f64>]) -> Option<(f64, f64, f64, f64)> {
    let mut vtv = Matrix6::<f64>::zeros();
    let mut push = |row: [f64; 6]| {
        let v = Vector6::from_row_slice(&row);
        vtv += v * v.transpose();
    };
    for h in hs {
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        push(v_ij(h, 0, 1));
        push(std::array::from_fn(|k| v11[k] - v22[k]));
    }
    // Zero skew: B12 = 0.
    push([0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);

    let eig = SymmetricEigen::new(vtv);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let mut b = eig.eigenvectors.column(min_idx).into_owned();
    if b[0] < 0.0 {
        b = -b;
    }
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    if denom.abs() < 1e-18 || b11.abs() < 1e-18 {
        return None;
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda <= 0.0 {
        return None;
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let u0 = -b13 * alpha * alpha / lambda;
    [alpha, beta, u0, v0]
        .iter()
        .all(|v| v.is_finite())
        .then_some((alpha, beta, u0, v0))
}

/// Focal lengths with the principal point fixed at the origin.
///
/// Solves the two Zhang constraints per view for `1/fx²` and `1/fy²`.
fn focal_only(hs: &[Matrix3<f64>]) -> Option<(f64, f64)> {
    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for h in hs {
        let rows = [
            ([h[(0, 0)] * h[(0, 1)], h[(1, 0)] * h[(1, 1)]], -h[(2, 0)] * h[(2, 1)]),
            (
                [
                    h[(0, 0)].powi(2) - h[(0, 1)].powi(2),
                    h[(1, 0)].powi(2) - h[(1, 1)].powi(2),
                ],
                -(h[(2, 0)].powi(2) - h[(2, 1)].powi(2)),
            ),
        ];
        for (a, rhs) in rows {
            let a = Vector2::new(a[0], a[1]);
            ata += a * a.transpose();
            atb += a * rhs;
        }
    }
    let sol = ata.try_inverse()? * atb;
    (sol[0] > 0.0 && sol[1] > 0.0).then(|| (1.0 / sol[0].sqrt(), 1.0 / sol[1].sqrt()))
}

/// Board pose from a homography and the camera matrix.
///
/// The pose is chosen so the board lies in front of the camera.
fn extrinsics_from_homography(
    k_inv: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    let r1_raw = k_inv * h.column(0);
    let r2_raw = k_inv * h.column(1);
    let t_raw = k_inv * h.column(2);
    let norm = r1_raw.norm();
    if norm < 1e-18 {
        return None;
    }
    let mut scale = 1.0 / norm;
    if t_raw.z * scale < 0.0 {
        scale = -scale;
    }

    let r1 = r1_raw * scale;
    let r2 = r2_raw * scale;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r.svd(true, true);
    let (u, vt) = (svd.u?, svd.v_t?);
    let mut rot = u * vt;
    if rot.determinant() < 0.0 {
        rot = -rot;
    }
    Some((Rotation3::from_matrix_unchecked(rot), t_raw * scale))
}

const INTRINSICS: usize = 9;
const POSE: usize = 6;

fn pack(profile: &CalibrationProfile, poses: &[(Rotation3<f64>, Vector3<f64>)]) -> DVector<f64> {
    let mut p = DVector::zeros(INTRINSICS + POSE * poses.len());
    p[0] = profile.fx();
    p[1] = profile.fy();
    p[2] = profile.cx();
    p[3] = profile.cy();
    for (k, v) in profile.distortion.to_array().into_iter().enumerate() {
        p[4 + k] = v;
    }
    for (view, (rot, t)) in poses.iter().enumerate() {
        let base = INTRINSICS + POSE * view;
        let axis = rot.scaled_axis();
        for k in 0..3 {
            p[base + k] = axis[k];
            p[base + 3 + k] = t[k];
        }
    }
    p
}

fn unpack_camera(p: &DVector<f64>, image_size: (usize, usize)) -> CalibrationProfile {
    CalibrationProfile::new(
        p[0],
        p[1],
        p[2],
        p[3],
        Distortion::from_array([p[4], p[5], p[6], p[7], p[8]]),
        image_size,
    )
}

fn unpack_pose(p: &DVector<f64>, view: usize) -> (Rotation3<f64>, Vector3<f64>) {
    let base = INTRINSICS + POSE * view;
    let axis = Vector3::new(p[base], p[base + 1], p[base + 2]);
    let t = Vector3::new(p[base + 3], p[base + 4], p[base + 5]);
    (Rotation3::new(axis), t)
}

/// Residual for points behind the camera.
const BEHIND_PENALTY: f64 = 1e4;

fn reprojection_residuals(
    p: &DVector<f64>,
    corr: &CalibrationCorrespondences,
    image_size: (usize, usize),
) -> DVector<f64> {
    let camera = unpack_camera(p, image_size);
    let total: usize = corr.image_points.iter().map(Vec::len).sum();
    let mut r = DVector::zeros(2 * total);
    let mut k = 0;
    for (view, (obj, img)) in corr.object_points.iter().zip(&corr.image_points).enumerate() {
        let (rot, t) = unpack_pose(p, view);
        for (o, i) in obj.iter().zip(img) {
            match camera.project(&rot, &t, o) {
                Some(q) => {
                    r[k] = q.x - i.x as f64;
                    r[k + 1] = q.y - i.y as f64;
                }
                None => {
                    r[k] = BEHIND_PENALTY;
                    r[k + 1] = BEHIND_PENALTY;
                }
            }
            k += 2;
        }
    }
    r
}

/// Solve the camera model from board correspondences.
///
/// Three or more views fit all intrinsics and the full distortion vector;
/// fewer views keep the principal point at the image centre and solve only
/// focal lengths and `k1`, `k2`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(corr), fields(views = corr.views()))
)]
pub fn calibrate(
    corr: &CalibrationCorrespondences,
    image_size: (usize, usize),
) -> Result<CalibrationProfile, CalibrationError> {
    let (width, height) = image_size;
    if width == 0 || height == 0 {
        return Err(CalibrationError::InvalidImageSize { width, height });
    }
    let views = corr.views();
    if views == 0 {
        return Err(CalibrationError::NoUsableImages { tried: 0 });
    }

    // Pixel coordinates are centred and scaled to ~unit range before the
    // closed-form solves.
    let s = width.max(height) as f64;
    let (c0x, c0y) = ((width as f64 - 1.0) * 0.5, (height as f64 - 1.0) * 0.5);
    let norm = Matrix3::new(1.0 / s, 0.0, -c0x / s, 0.0, 1.0 / s, -c0y / s, 0.0, 0.0, 1.0);

    let mut homographies = Vec::with_capacity(views);
    let mut normalized = Vec::with_capacity(views);
    for (view, (obj, img)) in corr.object_points.iter().zip(&corr.image_points).enumerate() {
        let src: Vec<Point2<f64>> = obj.iter().map(|p| Point2::new(p.x, p.y)).collect();
        let dst: Vec<Point2<f64>> = img.iter().map(|p| p.cast::<f64>()).collect();
        let h = estimate_homography_f64(&src, &dst)
            .ok_or(CalibrationError::DegenerateView { view })?
            .h;
        let hn = norm * h;
        normalized.push(hn / hn.norm());
        homographies.push(h);
    }

    let full = views >= 3;
    let closed = if full { zhang_intrinsics(&normalized) } else { None };
    let (fx, fy, cx, cy) = match closed {
        Some((a, b, u0, v0)) => (a * s, b * s, u0 * s + c0x, v0 * s + c0y),
        None => {
            if full {
                warn!("closed-form intrinsics failed, falling back to centred principal point");
            }
            let (a, b) = focal_only(&normalized).unwrap_or((1.0, 1.0));
            (a * s, b * s, c0x, c0y)
        }
    };
    debug!("initial intrinsics fx={fx:.1} fy={fy:.1} cx={cx:.1} cy={cy:.1}");

    let initial = CalibrationProfile::new(fx, fy, cx, cy, Distortion::default(), image_size);
    let k_inv = initial
        .camera_matrix
        .try_inverse()
        .ok_or(CalibrationError::SolveFailed("singular initial camera matrix"))?;
    let poses = homographies
        .iter()
        .enumerate()
        .map(|(view, h)| {
            extrinsics_from_homography(&k_inv, h).ok_or(CalibrationError::DegenerateView { view })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut params = pack(&initial, &poses);
    let mut free = vec![true; params.len()];
    if !full {
        // cx, cy, p1, p2, k3 stay fixed.
        for i in [2, 3, 6, 7, 8] {
            free[i] = false;
        }
    }
    let report = levenberg_marquardt(
        &mut params,
        &free,
        |p| reprojection_residuals(p, corr, image_size),
        &LmOptions::default(),
    );

    let mut profile = unpack_camera(&params, image_size);
    if !(profile.fx().is_finite() && profile.fy().is_finite() && profile.fx() > 0.0 && profile.fy() > 0.0)
    {
        return Err(CalibrationError::SolveFailed("non-positive focal length"));
    }
    let points: usize = corr.image_points.iter().map(Vec::len).sum();
    profile.rms_reprojection_px = (2.0 * report.final_cost / points as f64).sqrt();
    profile.views = views;

    info!(
        "calibrated from {} views: fx={:.1} fy={:.1} cx={:.1} cy={:.1} rms={:.3}px",
        views,
        profile.fx(),
        profile.fy(),
        profile.cx(),
        profile.cy(),
        profile.rms_reprojection_px
    );
    Ok(profile)
}
