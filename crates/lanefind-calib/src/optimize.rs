//! Dense Levenberg–Marquardt over a subset of free parameters.

use nalgebra::{DMatrix, DVector};

#[derive(Clone, Debug)]
pub struct LmOptions {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    /// Relative cost decrease below which the solve stops.
    pub cost_tolerance: f64,
    /// Relative forward-difference step.
    pub diff_step: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            initial_lambda: 1e-3,
            cost_tolerance: 1e-12,
            diff_step: 1e-7,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LmReport {
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
}

fn cost(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

fn jacobian<F>(
    params: &DVector<f64>,
    free: &[usize],
    r0: &DVector<f64>,
    residuals: &F,
    diff_step: f64,
) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jac = DMatrix::zeros(r0.len(), free.len());
    let mut stepped = params.clone();
    for (col, &i) in free.iter().enumerate() {
        let h = diff_step * params[i].abs().max(1.0);
        stepped[i] = params[i] + h;
        let r = residuals(&stepped);
        stepped[i] = params[i];
        jac.set_column(col, &((r - r0) / h));
    }
    jac
}

/// Minimize `0.5 * |residuals(p)|²` in place, varying only `p[i]` where
/// `free[i]` is set.
///
/// Damping follows Marquardt: the normal matrix diagonal is scaled by
/// `1 + λ`; λ shrinks tenfold on accepted steps and grows tenfold on
/// rejected ones.
pub fn levenberg_marquardt<F>(
    params: &mut DVector<f64>,
    free: &[bool],
    residuals: F,
    opts: &LmOptions,
) -> LmReport
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let free_idx: Vec<usize> = free
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect();

    let mut r = residuals(params);
    let initial_cost = cost(&r);
    let mut report = LmReport {
        iterations: 0,
        initial_cost,
        final_cost: initial_cost,
        converged: false,
    };
    if free_idx.is_empty() || r.is_empty() {
        report.converged = true;
        return report;
    }

    let mut lambda = opts.initial_lambda;
    let mut current = initial_cost;

    'outer: for iter in 0..opts.max_iterations {
        report.iterations = iter + 1;
        let jac = jacobian(params, &free_idx, &r, &residuals, opts.diff_step);
        let jt = jac.transpose();
        let a = &jt * &jac;
        let g = &jt * &r;

        if g.amax() < 1e-14 {
            report.converged = true;
            break;
        }

        loop {
            let mut damped = a.clone();
            for k in 0..damped.nrows() {
                let d = a[(k, k)].max(1e-12);
                damped[(k, k)] += lambda * d;
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                if lambda > 1e12 {
                    break 'outer;
                }
                continue;
            };
            let delta = chol.solve(&(-&g));

            let mut candidate = params.clone();
            for (k, &i) in free_idx.iter().enumerate() {
                candidate[i] += delta[k];
            }
            let r_new = residuals(&candidate);
            let new_cost = cost(&r_new);

            if new_cost.is_finite() && new_cost < current {
                let decrease = (current - new_cost) / current.max(f64::MIN_POSITIVE);
                *params = candidate;
                r = r_new;
                current = new_cost;
                lambda = (lambda / 10.0).max(1e-15);
                if decrease < opts.cost_tolerance {
                    report.converged = true;
                    break 'outer;
                }
                break;
            }

            lambda *= 10.0;
            if lambda > 1e12 {
                // No descent direction left at this precision.
                report.converged = true;
                break 'outer;
            }
        }
    }

    report.final_cost = current;
    log::debug!(
        "LM: {} iterations, cost {:.3e} -> {:.3e}",
        report.iterations,
        report.initial_cost,
        report.final_cost
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fits_exponential_decay() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * (-0.7 * x).exp() + 0.5).collect();

        let mut p = DVector::from_vec(vec![1.0, -0.1, 0.0]);
        let report = levenberg_marquardt(
            &mut p,
            &[true, true, true],
            |p| DVector::from_iterator(xs.len(), xs.iter().zip(&ys).map(|(x, y)| p[0] * (p[1] * x).exp() + p[2] - y)),
            &LmOptions::default(),
        );

        assert!(report.final_cost < 1e-12, "{report:?}");
        assert_abs_diff_eq!(p[0], 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p[1], -0.7, epsilon = 1e-5);
        assert_abs_diff_eq!(p[2], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn fixed_parameters_do_not_move() {
        let mut p = DVector::from_vec(vec![5.0, 2.0]);
        levenberg_marquardt(
            &mut p,
            &[true, false],
            |p| DVector::from_vec(vec![p[0] - 1.0, p[1] - 7.0]),
            &LmOptions::default(),
        );
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 1e-6);
        assert_eq!(p[1], 2.0);
    }
}
