//! Least-squares quadratic fits `x(y)` and their radius of curvature.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Quadratic coefficients of `x = a*y² + b*y + c`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadraticFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// |a| below this is treated as a straight line.
pub const STRAIGHT_EPS: f64 = 1e-12;

impl QuadraticFit {
    #[inline]
    pub fn eval(&self, y: f64) -> f64 {
        (self.a * y + self.b) * y + self.c
    }

    /// Mean of several fits, coefficient-wise. `None` for an empty input.
    pub fn mean<'a>(fits: impl IntoIterator<Item = &'a QuadraticFit>) -> Option<QuadraticFit> {
        let mut n = 0usize;
        let mut acc = [0.0f64; 3];
        for f in fits {
            acc[0] += f.a;
            acc[1] += f.b;
            acc[2] += f.c;
            n += 1;
        }
        (n > 0).then(|| {
            let n = n as f64;
            QuadraticFit {
                a: acc[0] / n,
                b: acc[1] / n,
                c: acc[2] / n,
            }
        })
    }
}

/// Number of distinct `y` values, saturating at 3.
fn distinct_rows(ys: &[f64]) -> usize {
    let mut seen: [f64; 2] = [f64::NAN; 2];
    let mut count = 0usize;
    for &y in ys {
        if seen[..count].contains(&y) {
            continue;
        }
        if count == 2 {
            return 3;
        }
        seen[count] = y;
        count += 1;
    }
    count
}

/// Least-squares quadratic through `(xs[i], ys[i])`, `x` as a function of `y`.
///
/// Returns `None` when fewer than three distinct `y` values are present or
/// the inputs disagree in length. The Vandermonde columns are scaled by the
/// largest |y| before the SVD solve to keep the system well conditioned.
pub fn fit_quadratic(xs: &[f64], ys: &[f64]) -> Option<QuadraticFit> {
    if xs.len() != ys.len() || distinct_rows(ys) < 3 {
        return None;
    }

    let scale = ys.iter().fold(0.0f64, |m, y| m.max(y.abs()));
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let n = xs.len();
    let mut a = DMatrix::<f64>::zeros(n, 3);
    for (i, &y) in ys.iter().enumerate() {
        let t = y / scale;
        a[(i, 0)] = t * t;
        a[(i, 1)] = t;
        a[(i, 2)] = 1.0;
    }
    let b = DVector::from_column_slice(xs);

    let sol = a.svd(true, true).solve(&b, 1e-12).ok()?;
    let fit = QuadraticFit {
        a: sol[0] / (scale * scale),
        b: sol[1] / scale,
        c: sol[2],
    };
    (fit.a.is_finite() && fit.b.is_finite() && fit.c.is_finite()).then_some(fit)
}

/// Radius of curvature of `fit` at `y_eval` (both in the same units).
///
/// A vanishing quadratic term means a straight line, reported as
/// `f64::INFINITY`.
pub fn radius_of_curvature(fit: &QuadraticFit, y_eval: f64) -> f64 {
    if fit.a.abs() < STRAIGHT_EPS {
        return f64::INFINITY;
    }
    let slope = 2.0 * fit.a * y_eval + fit.b;
    (1.0 + slope * slope).powf(1.5) / (2.0 * fit.a).abs()
}
