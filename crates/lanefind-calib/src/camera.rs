use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Brown-Conrady radial + tangential coefficients, OpenCV ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_array(a: [f64; 5]) -> Self {
        Self {
            k1: a[0],
            k2: a[1],
            p1: a[2],
            p2: a[3],
            k3: a[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&v| v == 0.0)
    }

    /// Distort a point in normalized camera coordinates.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }
}

/// Pinhole intrinsics plus lens distortion for one image size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
    /// `(width, height)` the profile was solved for.
    pub image_size: (usize, usize),
    pub rms_reprojection_px: f64,
    /// Number of board views that contributed.
    pub views: usize,
}

impl CalibrationProfile {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, distortion: Distortion, image_size: (usize, usize)) -> Self {
        Self {
            camera_matrix: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            distortion,
            image_size,
            rms_reprojection_px: 0.0,
            views: 0,
        }
    }

    /// Distortion-free camera; undistortion with it is the identity.
    pub fn identity(width: usize, height: usize) -> Self {
        let f = width.max(height) as f64;
        Self::new(
            f,
            f,
            (width as f64 - 1.0) * 0.5,
            (height as f64 - 1.0) * 0.5,
            Distortion::default(),
            (width, height),
        )
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    /// Pixel position of a normalized camera coordinate after distortion.
    #[inline]
    pub fn distort_normalized(&self, x: f64, y: f64) -> Point2<f64> {
        let (xd, yd) = self.distortion.apply(x, y);
        Point2::new(self.fx() * xd + self.cx(), self.fy() * yd + self.cy())
    }

    /// Project a world point seen from pose `(rotation, translation)`.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project(
        &self,
        rotation: &Rotation3<f64>,
        translation: &Vector3<f64>,
        p: &Point3<f64>,
    ) -> Option<Point2<f64>> {
        let pc = rotation * p.coords + translation;
        if pc.z <= f64::EPSILON {
            return None;
        }
        Some(self.distort_normalized(pc.x / pc.z, pc.y / pc.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_distortion_is_identity() {
        let d = Distortion::default();
        assert!(d.is_zero());
        assert_eq!(d.apply(0.3, -0.2), (0.3, -0.2));
    }

    #[test]
    fn barrel_distortion_pulls_points_inward() {
        let d = Distortion {
            k1: -0.2,
            ..Default::default()
        };
        let (x, y) = d.apply(0.5, 0.0);
        assert!(x < 0.5);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn projection_through_principal_axis_hits_principal_point() {
        let profile = CalibrationProfile::new(800.0, 810.0, 320.0, 240.0, Distortion::default(), (640, 480));
        let r = Rotation3::identity();
        let t = Vector3::new(0.0, 0.0, 5.0);
        let p = profile.project(&r, &t, &Point3::new(0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(p.x, 320.0);
        assert_relative_eq!(p.y, 240.0);

        let q = profile.project(&r, &t, &Point3::new(1.0, 0.5, 0.0)).unwrap();
        assert_relative_eq!(q.x, 320.0 + 800.0 / 5.0);
        assert_relative_eq!(q.y, 240.0 + 810.0 * 0.1);
        assert!(profile.project(&r, &-t, &Point3::origin()).is_none());
    }
}
