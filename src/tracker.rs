//! Windowed extrema tracker.
//!
//! For a reference index, the tracker searches a window of data for extrema
//! of the trend-subtracted frequency, sized so that `n_before` extrema lie
//! strictly before the reference index and `n_after` at or after it. The
//! window is grown or shrunk from the extrema it finds, the trend is refit to
//! the extrema, and the loop repeats until the extrema frequencies stop
//! moving. Too few extrema (the end of the data is near) is reported as a
//! short result, not an error.

use crate::config::ExtremaConfig;
use crate::diagnostics::{ExtremaObserver, WindowSnapshot};
use crate::error::{ExtremaError, Result};
use crate::helpers::{first_index_above, max_spacing, value_range, FOUR_PI};
use crate::peaks::{find_peaks, PeakOptions};
use crate::refine::{refine_extremum, RefineOptions};
use crate::series::{OrbitalTimeSeries, Polarity};
use crate::trend::{TrendBounds, TrendModel, TrendParams};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Log at `debug` when verbose, `trace` otherwise.
macro_rules! iteration_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

/// One located extremum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    /// Grid index of the detected peak
    pub index: usize,
    pub t: f64,
    pub omega: f64,
    pub phase: f64,
    /// Whether `t`, `omega` and `phase` come from the local fits
    pub refined: bool,
}

/// Why a tracker call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerStatus {
    /// The extrema frequencies moved by less than the tolerance.
    Converged,
    /// Too few extrema, or the right side stayed short (end of data).
    Short,
    /// The window contained no extrema at all.
    NoExtrema,
    /// The per-call iteration cap was hit.
    IterationLimit,
}

/// Inputs of one tracker call that change between calls.
#[derive(Debug, Clone, Copy)]
pub struct TrackerRequest {
    pub idx_ref: usize,
    pub polarity: Polarity,
    /// Extrema wanted strictly before `idx_ref`
    pub n_before: usize,
    /// Extrema wanted at or after `idx_ref`
    pub n_after: usize,
    /// Periastron-advance estimate
    pub k: f64,
    /// Trend parameters to start from
    pub params: TrendParams,
    /// Allow moving `idx_ref` forward when too little data precedes it
    pub allow_advance_reference: bool,
}

/// Result of one tracker call.
#[derive(Debug, Clone)]
pub struct TrackerOutcome {
    /// Extrema in time order; may hold fewer than `n_before + n_after`
    pub extrema: Vec<Extremum>,
    /// Trend parameters refit to the extrema
    pub params: TrendParams,
    /// Updated periastron-advance estimate
    pub k: f64,
    /// Reference index, possibly advanced
    pub idx_ref: usize,
    pub idx_lo: usize,
    pub idx_hi: usize,
    pub iterations: usize,
    pub status: TrackerStatus,
}

impl TrackerOutcome {
    /// Grid indices of the extrema.
    pub fn indices(&self) -> Vec<usize> {
        self.extrema.iter().map(|e| e.index).collect()
    }
}

/// Peak-detection thresholds, frozen until the next trend refit.
#[derive(Debug, Clone, Copy)]
struct PeakThresholds {
    width: f64,
    prominence: f64,
}

/// Mutable state of the window search.
#[derive(Debug, Clone)]
struct WindowState {
    idx_lo: usize,
    idx_hi: usize,
    idx_ref: usize,
    k: f64,
    params: TrendParams,
    iteration: usize,
    right_short: usize,
    /// Window after the last adjustment
    last_window: Option<(usize, usize)>,
    thresholds: Option<PeakThresholds>,
    /// Extrema frequencies at the last refit
    previous_omega: Option<Vec<f64>>,
}

impl WindowState {
    fn outcome(self, extrema: Vec<Extremum>, status: TrackerStatus) -> TrackerOutcome {
        TrackerOutcome {
            extrema,
            params: self.params,
            k: self.k,
            idx_ref: self.idx_ref,
            idx_lo: self.idx_lo,
            idx_hi: self.idx_hi,
            iterations: self.iteration,
            status,
        }
    }
}

/// Extrema tracker bound to one series, trend model and configuration.
#[derive(Debug, Clone, Copy)]
pub struct WindowedTracker<'a> {
    series: OrbitalTimeSeries<'a>,
    model: TrendModel,
    bounds: TrendBounds,
    config: &'a ExtremaConfig,
}

impl<'a> WindowedTracker<'a> {
    pub fn new(
        series: OrbitalTimeSeries<'a>,
        model: TrendModel,
        bounds: TrendBounds,
        config: &'a ExtremaConfig,
    ) -> Self {
        Self {
            series,
            model,
            bounds,
            config,
        }
    }

    /// Locate extrema around `request.idx_ref`.
    ///
    /// # Errors
    /// - [`ExtremaError::NotEnoughExtremaBefore`] if fewer than `n_before`
    ///   extrema precede the reference index, the window already starts at
    ///   the beginning of the data and the reference may not be advanced
    /// - trend evaluation and fit failures, unchanged
    pub fn track(
        &self,
        request: &TrackerRequest,
        observer: &mut dyn ExtremaObserver,
    ) -> Result<TrackerOutcome> {
        let t = self.series.t();
        let phase = self.series.phase();
        let omega = self.series.omega();
        let m = self.series.len();
        let config = self.config;
        let verbose = config.verbose;
        let sign = request.polarity.sign();
        let (n_before, n_after) = (request.n_before, request.n_after);

        if request.idx_ref >= m {
            return Err(ExtremaError::InvalidInput(format!(
                "reference index {} outside data of length {}",
                request.idx_ref, m
            )));
        }
        if !(request.k.is_finite() && request.k > 0.0) {
            return Err(ExtremaError::InvalidInput(format!(
                "periastron-advance estimate must be positive, got {}",
                request.k
            )));
        }

        let delta_phase = FOUR_PI * request.k;
        let idx_ref = request.idx_ref;
        let mut state = WindowState {
            idx_lo: first_index_above(phase, phase[idx_ref] - delta_phase * n_before as f64)
                .min(idx_ref),
            idx_hi: first_index_above(phase, phase[idx_ref] + delta_phase * n_after as f64),
            idx_ref,
            k: request.k,
            params: request.params,
            iteration: 0,
            right_short: 0,
            last_window: None,
            thresholds: None,
            previous_omega: None,
        };
        if state.idx_hi == m {
            debug!(idx_ref, "window reaches the end of the data");
        }
        debug!(
            polarity = %request.polarity,
            idx_ref,
            k = state.k,
            trend = %self.model.describe(&state.params),
            refine = config.refine_extrema,
            "tracking extrema"
        );

        loop {
            state.iteration += 1;
            let (lo, hi) = (state.idx_lo, state.idx_hi);
            iteration_event!(
                verbose,
                iteration = state.iteration,
                idx_lo = lo,
                idx_ref = state.idx_ref,
                idx_hi = hi,
                k = state.k,
                "window iteration"
            );

            let trend = self.model.evaluate(&t[lo..hi], &state.params)?;
            let residual: Vec<f64> = omega[lo..hi]
                .iter()
                .zip(trend.iter())
                .map(|(&w, &f)| w - f)
                .collect();

            let thresholds = *state.thresholds.get_or_insert_with(|| {
                let omega_max = omega[lo..hi].iter().cloned().fold(0.0, f64::max);
                let dt_max = max_spacing(&t[lo..hi]);
                let width = if omega_max > 0.0 && dt_max > 0.0 {
                    (0.5 * 2.0 * PI / omega_max / dt_max).floor()
                } else {
                    0.0
                };
                let prominence = config.prominence_fraction * value_range(&residual);
                iteration_event!(verbose, width, prominence, "peak thresholds");
                PeakThresholds { width, prominence }
            });

            let signed: Vec<f64> = residual.iter().map(|&r| sign * r).collect();
            let options = PeakOptions {
                prominence: Some(thresholds.prominence),
                width: Some(thresholds.width),
                ..Default::default()
            };
            let indices: Vec<usize> = find_peaks(&signed, &options)
                .indices
                .into_iter()
                .map(|i| i + lo)
                .collect();
            let n_extrema = indices.len();
            let n_left = indices.iter().filter(|&&i| i < state.idx_ref).count();
            let mut n_right = n_extrema - n_left;

            observer.window_iteration(&WindowSnapshot {
                iteration: state.iteration,
                idx_lo: lo,
                idx_hi: hi,
                idx_ref: state.idx_ref,
                k: state.k,
                params: state.params,
                width: thresholds.width,
                prominence: thresholds.prominence,
                residual: &residual,
                extrema: &indices,
                n_left,
                n_right,
            });
            iteration_event!(verbose, ?indices, n_left, n_right, "extrema detected");

            let mut extrema: Vec<Extremum> = indices
                .iter()
                .map(|&i| Extremum {
                    index: i,
                    t: t[i],
                    omega: omega[i],
                    phase: phase[i],
                    refined: false,
                })
                .collect();

            if n_extrema == 0 {
                warn!(
                    idx_lo = lo,
                    idx_hi = hi,
                    prominence = thresholds.prominence,
                    "no extremum found in window; oscillations may be below the prominence threshold"
                );
                return Ok(state.outcome(extrema, TrackerStatus::NoExtrema));
            }
            if state.iteration > config.max_window_iterations {
                warn!(
                    iterations = state.iteration,
                    idx_lo = lo,
                    idx_hi = hi,
                    "window search did not settle; returning current extrema"
                );
                return Ok(state.outcome(extrema, TrackerStatus::IterationLimit));
            }

            if config.refine_extrema {
                self.refine(&mut extrema, &state.params)?;
            }

            if n_extrema >= 2 {
                let first = extrema[0].phase;
                let last = extrema[n_extrema - 1].phase;
                state.k = (last - first) / (FOUR_PI * (n_extrema - 1) as f64);
            }

            if n_right < n_after {
                state.right_short += 1;
                iteration_event!(verbose, right_short = state.right_short, "right side short");
            }

            if n_left != n_before || n_right != n_after {
                if n_left > n_before {
                    let excess = n_left - n_before;
                    state.idx_lo = (indices[excess - 1] + indices[excess]) / 2;
                } else if n_left < n_before {
                    if state.idx_lo == 0 {
                        if !request.allow_advance_reference {
                            return Err(ExtremaError::NotEnoughExtremaBefore {
                                needed: n_before,
                                found: n_left,
                                idx_ref: state.idx_ref,
                                idx_lo: state.idx_lo,
                                idx_hi: state.idx_hi,
                                iteration: state.iteration,
                            });
                        }
                        // Advancing needs two extrema to average; otherwise
                        // wait for the right side to grow first.
                        if n_right >= 2 {
                            state.idx_ref = (indices[n_left] + indices[n_left + 1]) / 2;
                            n_right -= 1;
                            iteration_event!(verbose, idx_ref = state.idx_ref, "reference index advanced");
                        }
                    } else {
                        // Step back 0.6 radial periods so that at most one
                        // extremum is gained.
                        let phase_lo =
                            phase[state.idx_lo] - state.k * FOUR_PI * config.window_step_fraction;
                        state.idx_lo = first_index_above(phase, phase_lo).min(state.idx_lo);
                    }
                }

                if n_right > n_after {
                    let excess = n_right - n_after;
                    state.idx_hi = (indices[n_extrema - excess] + indices[n_extrema - excess - 1]) / 2;
                } else if n_right < n_after {
                    if state.idx_hi < m {
                        let phase_hi =
                            phase[state.idx_hi] + state.k * FOUR_PI * config.window_step_fraction;
                        state.idx_hi = first_index_above(phase, phase_hi);
                    } else {
                        iteration_event!(verbose, n_right, "window at end of data, right side still short");
                    }
                }

                let window = (state.idx_lo, state.idx_hi);
                if state.last_window != Some(window) {
                    state.last_window = Some(window);
                    continue;
                }
            }

            let omegas: Vec<f64> = extrema.iter().map(|e| e.omega).collect();
            let max_delta_omega = match &state.previous_omega {
                Some(previous) if previous.len() == omegas.len() => previous
                    .iter()
                    .zip(omegas.iter())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max),
                _ => f64::INFINITY,
            };

            if state.right_short >= config.max_right_short
                || n_extrema < config.min_extrema_for_refit
                || state.iteration > config.max_window_iterations
            {
                debug!(
                    n_extrema,
                    right_short = state.right_short,
                    iterations = state.iteration,
                    "returning short result"
                );
                return Ok(state.outcome(extrema, TrackerStatus::Short));
            }

            if max_delta_omega < config.tolerance {
                debug!(
                    max_delta_omega,
                    iterations = state.iteration,
                    k = state.k,
                    "extrema converged"
                );
                return Ok(state.outcome(extrema, TrackerStatus::Converged));
            }

            let times: Vec<f64> = extrema.iter().map(|e| e.t).collect();
            let fit = self.model.fit(
                &times,
                &omegas,
                &state.params,
                &self.bounds,
                config.max_fit_evaluations,
            )?;
            state.params = fit.params;
            state.thresholds = None;
            observer.trend_refit(state.iteration, &fit, max_delta_omega);
            iteration_event!(
                verbose,
                max_delta_omega,
                trend = %self.model.describe(&fit.params),
                "trend refit"
            );
            state.previous_omega = Some(omegas);
        }
    }

    fn refine(&self, extrema: &mut [Extremum], params: &TrendParams) -> Result<()> {
        let options = RefineOptions {
            phase_half_width: self.config.refine_phase_half_width,
            min_samples: self.config.min_refine_samples,
        };
        for extremum in extrema.iter_mut() {
            let refined = refine_extremum(
                self.series.t(),
                self.series.phase(),
                self.series.omega(),
                &self.model,
                params,
                extremum.t,
                extremum.omega,
                &options,
            )?;
            if let Some(r) = refined {
                extremum.t = r.t;
                extremum.omega = r.omega;
                extremum.phase = r.phase;
                extremum.refined = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::EccentricInspiral;
    use crate::trend::GlobalFitSetup;

    fn tracker_fixture() -> (crate::simulation::SimulatedInspiral, ExtremaConfig) {
        let sim = EccentricInspiral::default().generate().unwrap();
        (sim, ExtremaConfig::default())
    }

    #[test]
    fn test_track_finds_requested_counts() {
        let (sim, config) = tracker_fixture();
        let series = sim.series().unwrap();
        let setup = GlobalFitSetup::from_series(&series, config.global_fit_orbits).unwrap();
        let idx_end = setup.idx_end;
        let fit = setup
            .model
            .fit(
                &series.t()[..idx_end],
                &series.omega()[..idx_end],
                &setup.initial,
                &setup.bounds,
                config.max_fit_evaluations,
            )
            .unwrap();
        let tracker = WindowedTracker::new(series, setup.model, setup.bounds, &config);
        let idx_ref = first_index_above(series.phase(), series.phase()[0] + 1.2 * 2.999 * FOUR_PI);
        let request = TrackerRequest {
            idx_ref,
            polarity: Polarity::Maxima,
            n_before: 3,
            n_after: 4,
            k: 1.2,
            params: fit.params,
            allow_advance_reference: true,
        };
        let outcome = tracker.track(&request, &mut ()).unwrap();
        assert_eq!(outcome.status, TrackerStatus::Converged);
        assert_eq!(outcome.extrema.len(), 7);
        let before = outcome
            .extrema
            .iter()
            .filter(|e| e.index < outcome.idx_ref)
            .count();
        assert_eq!(before, 3);
        assert!(outcome.idx_ref >= idx_ref);
        // the oscillation slightly lowers the mean phase rate below 1.05
        assert!(
            outcome.k > 1.0 && outcome.k < 1.1,
            "periastron advance {}",
            outcome.k
        );
        for w in outcome.extrema.windows(2) {
            assert!(w[1].t > w[0].t);
        }
    }

    #[test]
    fn test_track_rejects_bad_reference() {
        let (sim, config) = tracker_fixture();
        let series = sim.series().unwrap();
        let setup = GlobalFitSetup::from_series(&series, config.global_fit_orbits).unwrap();
        let tracker = WindowedTracker::new(series, setup.model, setup.bounds, &config);
        let request = TrackerRequest {
            idx_ref: series.len(),
            polarity: Polarity::Minima,
            n_before: 3,
            n_after: 4,
            k: 1.2,
            params: setup.initial,
            allow_advance_reference: true,
        };
        assert!(matches!(
            tracker.track(&request, &mut ()),
            Err(ExtremaError::InvalidInput(_))
        ));
    }
}
