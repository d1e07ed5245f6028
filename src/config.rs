//! Run configuration for extrema finding.
//!
//! Every toggle of a run lives in [`ExtremaConfig`], which is passed to the
//! driving loop and the tracker by reference. The defaults reproduce the
//! published procedure; the algorithm constants are exposed as fields so that
//! unusual waveforms can be handled without code changes.

use crate::error::{ExtremaError, Result};
use serde::{Deserialize, Serialize};

/// Configuration of one extrema-finding run.
///
/// Deserializes from partial documents: missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremaConfig {
    /// Number of extrema `N` requested before the reference index
    /// (`N + 1` are requested after it)
    pub extrema_per_side: usize,
    /// Refine extrema to sub-sample accuracy with local polynomial fits
    pub refine_extrema: bool,
    /// Exclude this many orbits of data before merger from the analysis
    pub num_orbits_to_exclude_before_merger: Option<f64>,
    /// Stop iterating a window once no extremum frequency moves by more than this
    pub tolerance: f64,
    /// Emit per-iteration window state at `debug` instead of `trace` level
    pub verbose: bool,
    /// Orbits from the start of the data used for the global warm-start fit
    pub global_fit_orbits: f64,
    /// Initial periastron-advance estimate `K`
    pub initial_periastron_advance: f64,
    /// Prominence threshold as a fraction of the residual's peak-to-trough range
    pub prominence_fraction: f64,
    /// Window growth per adjustment, in radial periods
    pub window_step_fraction: f64,
    /// Half-width (radians of orbital phase) of the refinement interval
    pub refine_phase_half_width: f64,
    /// Minimum samples inside the refinement interval
    pub min_refine_samples: usize,
    /// Fewer extrema than this end the window iteration (3-parameter refit needs slack)
    pub min_extrema_for_refit: usize,
    /// Consecutive right-side shortfalls that end the window iteration
    pub max_right_short: usize,
    /// Iterations of one window search before the best available result is returned
    pub max_window_iterations: usize,
    /// Tracker calls per run before aborting with a runaway-iteration error
    pub max_steps: usize,
    /// Residual evaluations allowed per trend fit
    pub max_fit_evaluations: usize,
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        Self {
            extrema_per_side: 3,
            refine_extrema: false,
            num_orbits_to_exclude_before_merger: None,
            tolerance: 1e-8,
            verbose: false,
            global_fit_orbits: 10.0,
            initial_periastron_advance: 1.2,
            prominence_fraction: 0.03,
            window_step_fraction: 0.6,
            refine_phase_half_width: 0.05,
            min_refine_samples: 7,
            min_extrema_for_refit: 5,
            max_right_short: 5,
            max_window_iterations: 20,
            max_steps: 1000,
            max_fit_evaluations: 10_000,
        }
    }
}

impl ExtremaConfig {
    /// Check that all values are usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("tolerance", self.tolerance),
            ("global_fit_orbits", self.global_fit_orbits),
            ("initial_periastron_advance", self.initial_periastron_advance),
            ("prominence_fraction", self.prominence_fraction),
            ("window_step_fraction", self.window_step_fraction),
            ("refine_phase_half_width", self.refine_phase_half_width),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ExtremaError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.extrema_per_side == 0 {
            return Err(ExtremaError::InvalidConfig(
                "extrema_per_side must be at least 1".to_string(),
            ));
        }
        if let Some(orbits) = self.num_orbits_to_exclude_before_merger {
            if !(orbits.is_finite() && orbits >= 0.0) {
                return Err(ExtremaError::InvalidConfig(format!(
                    "num_orbits_to_exclude_before_merger must be non-negative, got {orbits}"
                )));
            }
        }
        if self.min_refine_samples < 4 {
            // cubic phase fit needs four points
            return Err(ExtremaError::InvalidConfig(format!(
                "min_refine_samples must be at least 4, got {}",
                self.min_refine_samples
            )));
        }
        if self.max_window_iterations == 0 || self.max_steps == 0 || self.max_fit_evaluations == 0
        {
            return Err(ExtremaError::InvalidConfig(
                "iteration caps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
