//! Secular trend model of the orbital frequency.
//!
//! The non-oscillatory growth of the frequency toward merger is modelled as
//! `A (T - t)^n`. The fit is parameterized by the value `f0` and slope `f1` of
//! the trend at a fixed reference time `t0`, and by the divergence ("merger")
//! time `T`:
//!
//! ```text
//! n = -(T - t0) f1 / f0
//! A = f0 (T - t0)^(-n)
//! ```
//!
//! so the parameters keep a direct meaning and similar conditioning across
//! the whole inspiral.

use crate::error::{ExtremaError, Result};
use crate::helpers::FOUR_PI;
use crate::optimize::{least_squares, LeastSquaresOptions, LeastSquaresProblem};
use crate::series::OrbitalTimeSeries;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Post-Newtonian exponent of the leading-order frequency evolution.
pub const PN_EXPONENT: f64 = -3.0 / 8.0;

/// Minimum distance of the merger time past the last sample, as a fraction
/// of the data span, used when no later merger time is known.
const MIN_MERGER_GAP_FRACTION: f64 = 0.01;

/// Trend parameters `(f0, f1, T)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    /// Trend value at the reference time
    pub f0: f64,
    /// Trend time-derivative at the reference time
    pub f1: f64,
    /// Divergence time of the trend
    pub merger_time: f64,
}

impl TrendParams {
    pub fn new(f0: f64, f1: f64, merger_time: f64) -> Self {
        Self { f0, f1, merger_time }
    }

    fn to_array(self) -> [f64; 3] {
        [self.f0, self.f1, self.merger_time]
    }

    fn from_slice(p: &[f64]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl fmt::Display for TrendParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f0={:.6e}, f1={:.6e}, T={:.4}",
            self.f0, self.f1, self.merger_time
        )
    }
}

/// Box constraints on [`TrendParams`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendBounds {
    pub lower: TrendParams,
    pub upper: TrendParams,
}

impl TrendBounds {
    /// Check `lower <= upper` component-wise.
    pub fn validate(&self) -> Result<()> {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        if (0..3).any(|j| !(lo[j] <= hi[j])) {
            return Err(ExtremaError::InvalidConfig(format!(
                "trend bounds are inverted: lower=({}), upper=({})",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    /// Project `params` into the box.
    pub fn clamp(&self, params: TrendParams) -> TrendParams {
        TrendParams::new(
            params.f0.clamp(self.lower.f0, self.upper.f0),
            params.f1.clamp(self.lower.f1, self.upper.f1),
            params
                .merger_time
                .clamp(self.lower.merger_time, self.upper.merger_time),
        )
    }
}

/// Outcome of a trend fit.
#[derive(Debug, Clone, Copy)]
pub struct TrendFit {
    pub params: TrendParams,
    /// Half the sum of squared residuals
    pub cost: f64,
    /// Residual and Jacobian evaluations spent
    pub evaluations: usize,
}

/// The power-law trend anchored at reference time `t0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendModel {
    t0: f64,
}

impl TrendModel {
    pub fn new(t0: f64) -> Result<Self> {
        if !t0.is_finite() {
            return Err(ExtremaError::InvalidConfig(format!(
                "trend reference time must be finite, got {t0}"
            )));
        }
        Ok(Self { t0 })
    }

    /// Reference time `t0`.
    pub fn reference_time(&self) -> f64 {
        self.t0
    }

    /// Power-law exponent `n`.
    pub fn exponent(&self, p: &TrendParams) -> f64 {
        -(p.merger_time - self.t0) * p.f1 / p.f0
    }

    /// Amplitude `A`.
    pub fn amplitude(&self, p: &TrendParams) -> f64 {
        p.f0 * (p.merger_time - self.t0).powf(-self.exponent(p))
    }

    fn check_divergence(&self, t_max: f64, p: &TrendParams) -> Result<()> {
        let latest = t_max.max(self.t0);
        if latest >= p.merger_time || !p.merger_time.is_finite() {
            return Err(ExtremaError::DivergenceViolation {
                params: *p,
                t_max: latest,
            });
        }
        Ok(())
    }

    /// Trend value at each time in `t`.
    ///
    /// Fails with [`ExtremaError::DivergenceViolation`] if any `t >= T`.
    pub fn evaluate(&self, t: &[f64], p: &TrendParams) -> Result<Vec<f64>> {
        let t_max = t.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        self.check_divergence(t_max, p)?;
        let tau0 = p.merger_time - self.t0;
        let n = self.exponent(p);
        Ok(t
            .iter()
            .map(|&ti| p.f0 * ((p.merger_time - ti) / tau0).powf(n))
            .collect())
    }

    /// Trend value at a single time.
    pub fn evaluate_at(&self, t: f64, p: &TrendParams) -> Result<f64> {
        self.check_divergence(t, p)?;
        let tau0 = p.merger_time - self.t0;
        Ok(p.f0 * ((p.merger_time - t) / tau0).powf(self.exponent(p)))
    }

    /// `∂f/∂(f0, f1, T)` at each time, as an `m x 3` matrix.
    pub fn jacobian(&self, t: &[f64], p: &TrendParams) -> Result<DMatrix<f64>> {
        let t_max = t.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        self.check_divergence(t_max, p)?;
        let tau0 = p.merger_time - self.t0;
        let n = self.exponent(p);
        let mut jac = DMatrix::zeros(t.len(), 3);
        for (i, &ti) in t.iter().enumerate() {
            let tau = p.merger_time - ti;
            let log_ratio = (tau / tau0).ln();
            let f = p.f0 * (tau / tau0).powf(n);
            jac[(i, 0)] = f / p.f0 * (1.0 - n * log_ratio);
            jac[(i, 1)] = -f * log_ratio * tau0 / p.f0;
            jac[(i, 2)] = f * n * (log_ratio / tau0 + 1.0 / tau - 1.0 / tau0);
        }
        Ok(jac)
    }

    /// Human-readable `A(T-t)^n` form of `p`.
    pub fn describe(&self, p: &TrendParams) -> String {
        format!(
            "{}({:+.2}-t)^{:.3}",
            format_significant(self.amplitude(p), 3),
            p.merger_time,
            self.exponent(p)
        )
    }

    /// Bounded least-squares fit of the trend to `(t, freq)`.
    ///
    /// # Arguments
    /// * `t` - Sample times (all before the lower bound on `T`)
    /// * `freq` - Frequencies at `t`
    /// * `initial` - Starting point, projected into `bounds`
    /// * `bounds` - Box constraints
    /// * `max_evaluations` - Evaluation budget
    ///
    /// # Errors
    /// [`ExtremaError::FitNonConvergence`] when the budget runs out, and any
    /// [`ExtremaError::DivergenceViolation`] raised while evaluating the model.
    pub fn fit(
        &self,
        t: &[f64],
        freq: &[f64],
        initial: &TrendParams,
        bounds: &TrendBounds,
        max_evaluations: usize,
    ) -> Result<TrendFit> {
        if t.len() != freq.len() {
            return Err(ExtremaError::InvalidInput(format!(
                "trend fit: {} times but {} frequencies",
                t.len(),
                freq.len()
            )));
        }
        if t.len() < 3 {
            return Err(ExtremaError::InvalidInput(format!(
                "trend fit needs at least 3 points, got {}",
                t.len()
            )));
        }
        bounds.validate()?;

        let problem = TrendFitProblem {
            model: self,
            t,
            freq,
        };
        let lower = bounds.lower.to_array();
        let upper = bounds.upper.to_array();
        let options = LeastSquaresOptions {
            max_nfev: max_evaluations,
            ..Default::default()
        };
        let result = least_squares(
            &problem,
            &initial.to_array(),
            Some((&lower, &upper)),
            &options,
        )?;
        let params = TrendParams::from_slice(&result.x);
        if !result.converged {
            return Err(ExtremaError::FitNonConvergence {
                evaluations: result.nfev,
                params,
                cost: result.cost,
            });
        }
        Ok(TrendFit {
            params,
            cost: result.cost,
            evaluations: result.nfev,
        })
    }
}

struct TrendFitProblem<'a> {
    model: &'a TrendModel,
    t: &'a [f64],
    freq: &'a [f64],
}

impl LeastSquaresProblem for TrendFitProblem<'_> {
    fn residuals(&self, params: &[f64]) -> Result<Vec<f64>> {
        let p = TrendParams::from_slice(params);
        let trend = self.model.evaluate(self.t, &p)?;
        Ok(trend
            .iter()
            .zip(self.freq.iter())
            .map(|(&f, &y)| f - y)
            .collect())
    }

    fn jacobian(&self, params: &[f64], _residuals: &[f64]) -> Result<DMatrix<f64>> {
        self.model.jacobian(self.t, &TrendParams::from_slice(params))
    }
}

/// Model, starting point and bounds for the global warm-start fit.
#[derive(Debug, Clone, Copy)]
pub struct GlobalFitSetup {
    pub model: TrendModel,
    pub initial: TrendParams,
    pub bounds: TrendBounds,
    /// End (exclusive) of the stretch used for the global fit
    pub idx_end: usize,
}

impl GlobalFitSetup {
    /// Derive the global-fit setup from the analysed data.
    ///
    /// The fit uses the first `num_orbits` orbits (all data if shorter). The
    /// reference time is the middle of the data, the initial guess follows
    /// the leading post-Newtonian exponent, and the bounds allow frequencies
    /// up to ten times the data scale with `T` strictly after the data.
    pub fn from_series(series: &OrbitalTimeSeries<'_>, num_orbits: f64) -> Result<Self> {
        let t = series.t();
        let phase = series.phase();
        let omega = series.omega();
        let m = series.len();

        let phase_end = phase[0] + num_orbits * FOUR_PI;
        let idx_end = match phase.iter().position(|&ph| ph > phase_end) {
            Some(i) if i >= 3 => i,
            _ => m,
        };

        let t_first = t[0];
        let t_last = t[m - 1];
        let t0 = 0.5 * (t_first + t_last);
        let merger = series
            .merger_time()
            .max(t_last + MIN_MERGER_GAP_FRACTION * (t_last - t_first));

        let f0 = 0.5 * (omega[0] + omega[idx_end - 1]);
        let initial = TrendParams::new(f0, -PN_EXPONENT * f0 / (merger - t0), merger);
        let bounds = TrendBounds {
            lower: TrendParams::new(0.0, 0.0, t_last + 0.2 * (merger - t_last)),
            upper: TrendParams::new(10.0 * f0, 10.0 * f0 / (merger - t0), 2.0 * merger - t0),
        };
        bounds.validate()?;

        Ok(Self {
            model: TrendModel::new(t0)?,
            initial,
            bounds,
            idx_end,
        })
    }
}

/// Format `x` with `digits` significant digits, dropping trailing zeros.
fn format_significant(x: f64, digits: usize) -> String {
    if x == 0.0 || !x.is_finite() {
        return format!("{x}");
    }
    let exp = x.abs().log10().floor() as i32;
    if exp < -4 || exp >= digits as i32 {
        return format!("{:.*e}", digits.saturating_sub(1), x);
    }
    let decimals = (digits as i32 - 1 - exp).max(0) as usize;
    let s = format!("{:.*}", decimals, x);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
