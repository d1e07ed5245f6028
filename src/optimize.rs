//! Bounded nonlinear least squares.
//!
//! Minimizes `0.5 * sum(r_i(x)^2)` subject to box constraints with a
//! projected Levenberg-Marquardt iteration:
//! - Marquardt damping on a column-scaled system, so parameters of very
//!   different magnitude (a frequency, its derivative and a time) are
//!   treated uniformly
//! - variables sitting on a bound whose gradient points outward are frozen
//!   for that step, the others are clamped into the box
//! - residual evaluations are fallible; an error aborts the fit and is
//!   returned unchanged, non-finite residuals reject the step

use crate::error::{ExtremaError, Result};
use nalgebra::{DMatrix, DVector};

/// Threshold for treating scale factors as zero.
pub const ZERO_THRESHOLD: f64 = 1e-30;

/// Relative step for forward-difference Jacobians.
pub const DEFAULT_FINITE_DIFF_EPS: f64 = 1.4901161193847656e-8;

const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e20;

/// A residual vector `r(x)` with an optional analytic Jacobian.
pub trait LeastSquaresProblem {
    /// Residuals at `params`.
    fn residuals(&self, params: &[f64]) -> Result<Vec<f64>>;

    /// Jacobian `J[i, j] = ∂r_i/∂x_j` at `params` (`residuals` are `r(params)`).
    ///
    /// Defaults to forward differences with a step relative to `|x_j|`.
    fn jacobian(&self, params: &[f64], residuals: &[f64]) -> Result<DMatrix<f64>> {
        let n = params.len();
        let m = residuals.len();
        let mut jac = DMatrix::zeros(m, n);
        let mut x = params.to_vec();
        for j in 0..n {
            let orig = x[j];
            let h = DEFAULT_FINITE_DIFF_EPS * orig.abs().max(1.0);
            x[j] = orig + h;
            let r_pert = self.residuals(&x)?;
            x[j] = orig;
            for i in 0..m {
                jac[(i, j)] = (r_pert[i] - residuals[i]) / h;
            }
        }
        Ok(jac)
    }
}

/// Options for least squares optimization.
#[derive(Debug, Clone)]
pub struct LeastSquaresOptions {
    /// Maximum number of residual plus Jacobian evaluations
    pub max_nfev: usize,
    /// Relative reduction of the cost below which the fit has converged
    pub f_tol: f64,
    /// Relative parameter step below which the fit has converged
    pub x_tol: f64,
    /// Scaled gradient below which the fit has converged
    pub g_tol: f64,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            max_nfev: 1000,
            f_tol: 1e-8,
            x_tol: 1e-8,
            g_tol: 1e-8,
        }
    }
}

/// Result from least squares optimization.
#[derive(Debug, Clone)]
pub struct LeastSquaresResult {
    /// The optimal parameters found
    pub x: Vec<f64>,
    /// Residual vector at solution
    pub residuals: Vec<f64>,
    /// Half the sum of squared residuals
    pub cost: f64,
    /// Number of outer iterations
    pub iterations: usize,
    /// Number of residual and Jacobian evaluations
    pub nfev: usize,
    /// Whether a convergence criterion was met within the budget
    pub converged: bool,
}

fn half_sum_squares(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn all_finite(r: &[f64]) -> bool {
    r.iter().all(|v| v.is_finite())
}

/// Least squares with optional box bounds.
///
/// # Arguments
/// * `problem` - Residual function (and optionally its Jacobian)
/// * `x0` - Initial parameter guess, projected into the bounds
/// * `bounds` - Optional `(lower, upper)` for each parameter
/// * `options` - Solver options
///
/// # Returns
/// The best parameters found. `converged == false` means the evaluation
/// budget ran out first; errors from the residual function are propagated.
pub fn least_squares<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    x0: &[f64],
    bounds: Option<(&[f64], &[f64])>,
    options: &LeastSquaresOptions,
) -> Result<LeastSquaresResult> {
    let n = x0.len();
    if n == 0 {
        return Err(ExtremaError::InvalidInput(
            "least_squares: empty initial guess".to_string(),
        ));
    }

    let (lower, upper) = match bounds {
        Some((lo, hi)) => {
            if lo.len() != n || hi.len() != n {
                return Err(ExtremaError::InvalidInput(
                    "least_squares: bounds dimension mismatch".to_string(),
                ));
            }
            if let Some(j) = (0..n).find(|&j| !(lo[j] <= hi[j])) {
                return Err(ExtremaError::InvalidConfig(format!(
                    "least_squares: lower bound {} exceeds upper bound {} for parameter {}",
                    lo[j], hi[j], j
                )));
            }
            (lo.to_vec(), hi.to_vec())
        }
        None => (vec![f64::NEG_INFINITY; n], vec![f64::INFINITY; n]),
    };

    let mut x: Vec<f64> = (0..n).map(|j| x0[j].clamp(lower[j], upper[j])).collect();
    let mut r = problem.residuals(&x)?;
    let mut nfev = 1;
    let m = r.len();
    if m == 0 {
        return Err(ExtremaError::InvalidInput(
            "least_squares: residual function returns empty vector".to_string(),
        ));
    }
    if !all_finite(&r) {
        return Err(ExtremaError::InvalidInput(
            "least_squares: non-finite residuals at initial guess".to_string(),
        ));
    }

    let mut cost = half_sum_squares(&r);
    let mut lambda = LAMBDA_INITIAL;
    let mut iterations = 0;

    let finish = |x: Vec<f64>, r: Vec<f64>, cost, iterations, nfev, converged| LeastSquaresResult {
        x,
        residuals: r,
        cost,
        iterations,
        nfev,
        converged,
    };

    while nfev < options.max_nfev {
        iterations += 1;

        let jac = problem.jacobian(&x, &r)?;
        nfev += 1;
        let r_vec = DVector::from_column_slice(&r);
        let jtj = jac.tr_mul(&jac);
        let grad = jac.tr_mul(&r_vec);

        // Freeze variables pinned on a bound by a gradient pointing outward
        let frozen: Vec<bool> = (0..n)
            .map(|j| (x[j] <= lower[j] && grad[j] > 0.0) || (x[j] >= upper[j] && grad[j] < 0.0))
            .collect();
        let scale: Vec<f64> = (0..n)
            .map(|j| jtj[(j, j)].sqrt().max(ZERO_THRESHOLD))
            .collect();

        let r_norm = (2.0 * cost).sqrt();
        if r_norm == 0.0 {
            return Ok(finish(x, r, cost, iterations, nfev, true));
        }
        let scaled_grad = (0..n)
            .filter(|&j| !frozen[j])
            .map(|j| grad[j].abs() / (scale[j] * r_norm))
            .fold(0.0, f64::max);
        if scaled_grad <= options.g_tol {
            return Ok(finish(x, r, cost, iterations, nfev, true));
        }

        // Inner loop: raise damping until a step reduces the cost
        loop {
            if nfev >= options.max_nfev {
                return Ok(finish(x, r, cost, iterations, nfev, false));
            }

            let mut a = DMatrix::zeros(n, n);
            let mut b = DVector::zeros(n);
            for i in 0..n {
                if frozen[i] {
                    a[(i, i)] = 1.0;
                    continue;
                }
                for j in 0..n {
                    if !frozen[j] {
                        a[(i, j)] = jtj[(i, j)] / (scale[i] * scale[j]);
                    }
                }
                a[(i, i)] += lambda;
                b[i] = -grad[i] / scale[i];
            }

            let z = match a.lu().solve(&b) {
                Some(z) => z,
                None => {
                    lambda *= LAMBDA_UP;
                    if lambda > LAMBDA_MAX {
                        return Ok(finish(x, r, cost, iterations, nfev, true));
                    }
                    continue;
                }
            };

            let x_new: Vec<f64> = (0..n)
                .map(|j| (x[j] + z[j] / scale[j]).clamp(lower[j], upper[j]))
                .collect();
            let small_step = (0..n)
                .map(|j| (x_new[j] - x[j]).abs() / (x[j].abs() + options.x_tol))
                .fold(0.0, f64::max)
                <= options.x_tol;

            let r_new = problem.residuals(&x_new)?;
            nfev += 1;
            let cost_new = if all_finite(&r_new) {
                half_sum_squares(&r_new)
            } else {
                f64::INFINITY
            };

            if cost_new < cost {
                let reduction = (cost - cost_new) / cost;
                x = x_new;
                r = r_new;
                cost = cost_new;
                lambda = (lambda * LAMBDA_DOWN).max(LAMBDA_MIN);
                if reduction <= options.f_tol || small_step {
                    return Ok(finish(x, r, cost, iterations, nfev, true));
                }
                break;
            }

            lambda *= LAMBDA_UP;
            if small_step || lambda > LAMBDA_MAX {
                // No representable step improves the cost: stationary point
                return Ok(finish(x, r, cost, iterations, nfev, true));
            }
        }
    }

    Ok(finish(x, r, cost, iterations, nfev, false))
}
