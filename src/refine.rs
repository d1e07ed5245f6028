//! Sub-sample refinement of extrema.
//!
//! Peak detection places an extremum on a grid point. Around each one, a
//! quadratic is fit to the trend-subtracted frequency and its vertex taken as
//! the refined time; the frequency there is the quadratic plus the trend, and
//! the phase comes from a cubic fit over the same samples.

use crate::error::{ExtremaError, Result};
use crate::trend::{TrendModel, TrendParams};
use nalgebra::{DMatrix, DVector};

/// Least-squares polynomial in a centered and scaled variable.
///
/// Abscissae are mapped to `[-1, 1]` before the fit, so that a short interval
/// late in a long time series does not produce an ill-conditioned
/// Vandermonde matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// Coefficients in the scaled variable, lowest order first
    coefficients: Vec<f64>,
    center: f64,
    half_range: f64,
}

fn build_vandermonde_matrix(u: &[f64], n_coef: usize) -> DMatrix<f64> {
    let mut design = DMatrix::zeros(u.len(), n_coef);
    for (j, &uj) in u.iter().enumerate() {
        let mut power = 1.0;
        for k in 0..n_coef {
            design[(j, k)] = power;
            power *= uj;
        }
    }
    design
}

impl Polynomial {
    /// Fit a polynomial of `degree` to `(x, y)` by least squares.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self> {
        let n_coef = degree + 1;
        if x.len() != y.len() || x.len() < n_coef {
            return Err(ExtremaError::InvalidInput(format!(
                "polynomial fit of degree {} needs {} matching points, got {} and {}",
                degree,
                n_coef,
                x.len(),
                y.len()
            )));
        }
        let x_min = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let x_max = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let center = 0.5 * (x_min + x_max);
        let half_range = if (x_max - x_min).abs() > 1e-15 {
            0.5 * (x_max - x_min)
        } else {
            1.0
        };
        let u: Vec<f64> = x.iter().map(|&xi| (xi - center) / half_range).collect();

        let design = build_vandermonde_matrix(&u, n_coef);
        let rhs = DVector::from_row_slice(y);
        let beta = design
            .svd(true, true)
            .solve(&rhs, 1e-10)
            .map_err(|e| ExtremaError::InvalidInput(format!("polynomial fit failed: {e}")))?;

        Ok(Self {
            coefficients: beta.iter().cloned().collect(),
            center,
            half_range,
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Value at `x` (Horner's scheme).
    pub fn evaluate(&self, x: f64) -> f64 {
        let u = (x - self.center) / self.half_range;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * u + c)
    }

    /// Vertex of a quadratic, `None` for a degenerate (flat) parabola or
    /// another degree.
    pub fn vertex(&self) -> Option<f64> {
        if self.coefficients.len() != 3 {
            return None;
        }
        let (c1, c2) = (self.coefficients[1], self.coefficients[2]);
        let scale = self.coefficients.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
        if c2.abs() <= 1e-12 * scale || c2 == 0.0 {
            return None;
        }
        let u = -c1 / (2.0 * c2);
        let x = self.center + self.half_range * u;
        x.is_finite().then_some(x)
    }
}

/// Refined location of one extremum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedExtremum {
    pub t: f64,
    pub omega: f64,
    pub phase: f64,
}

/// Sampling window and fit settings for [`refine_extremum`].
#[derive(Debug, Clone, Copy)]
pub struct RefineOptions {
    /// Half-width of the fit interval in radians of orbital phase
    pub phase_half_width: f64,
    /// Minimum number of samples inside the interval
    pub min_samples: usize,
}

/// Refine the extremum at grid time `t_k` (frequency `omega_k`).
///
/// Uses all samples with `|t - t_k| < phase_half_width / omega_k`; `t` must
/// be sorted. Returns `Ok(None)` when fewer than `min_samples` fall in that
/// interval or the quadratic has no vertex, in which case the grid values
/// stand.
///
/// # Errors
/// Trend evaluation errors are propagated.
#[allow(clippy::too_many_arguments)]
pub fn refine_extremum(
    t: &[f64],
    phase: &[f64],
    omega: &[f64],
    model: &TrendModel,
    params: &TrendParams,
    t_k: f64,
    omega_k: f64,
    options: &RefineOptions,
) -> Result<Option<RefinedExtremum>> {
    let delta_t = options.phase_half_width / omega_k;
    // `t` is sorted: the interval is a contiguous range
    let lo = t.partition_point(|&v| v <= t_k - delta_t);
    let hi = t.partition_point(|&v| v < t_k + delta_t);
    if hi.saturating_sub(lo) < options.min_samples {
        return Ok(None);
    }

    let t_fit = &t[lo..hi];
    let trend = model.evaluate(t_fit, params)?;
    let residual: Vec<f64> = omega[lo..hi]
        .iter()
        .zip(trend.iter())
        .map(|(&w, &f)| w - f)
        .collect();

    let parabola = Polynomial::fit(t_fit, &residual, 2)?;
    let t_ext = match parabola.vertex() {
        Some(v) => v,
        None => return Ok(None),
    };
    let omega_ext = parabola.evaluate(t_ext) + model.evaluate_at(t_ext, params)?;

    let cubic = Polynomial::fit(t_fit, &phase[lo..hi], 3)?;

    Ok(Some(RefinedExtremum {
        t: t_ext,
        omega: omega_ext,
        phase: cubic.evaluate(t_ext),
    }))
}
