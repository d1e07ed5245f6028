//! Orbital time series and extremum polarity.
//!
//! The waveform-loading side of an analysis hands over three aligned arrays:
//! time, the phase of the dominant (2,2) mode and its frequency. This module
//! validates them once and offers the slicing needed to drop the final orbits
//! before merger.

use crate::error::{ExtremaError, Result};
use crate::helpers::{argmin_abs_diff, FOUR_PI};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which kind of extremum to track.
///
/// Periastron passages are maxima of the orbital frequency, apastron
/// passages are minima. Internally the choice is only a sign applied to the
/// trend-subtracted residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Local maxima (periastron)
    Maxima,
    /// Local minima (apastron)
    Minima,
}

impl Polarity {
    /// +1 for maxima, -1 for minima.
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Maxima => 1.0,
            Polarity::Minima => -1.0,
        }
    }
}

impl FromStr for Polarity {
    type Err = ExtremaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "maxima" | "peaks" => Ok(Polarity::Maxima),
            "minima" | "troughs" => Ok(Polarity::Minima),
            other => Err(ExtremaError::UnknownExtremaType(other.to_string())),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Maxima => write!(f, "maxima"),
            Polarity::Minima => write!(f, "minima"),
        }
    }
}

/// Borrowed, validated view of an orbital-frequency time series.
///
/// Invariants checked by [`OrbitalTimeSeries::new`]:
/// - `t`, `phase`, `omega` have equal length (at least 3)
/// - `t` is strictly increasing, `phase` is non-decreasing
/// - `omega` is finite and positive
#[derive(Debug, Clone, Copy)]
pub struct OrbitalTimeSeries<'a> {
    t: &'a [f64],
    phase: &'a [f64],
    omega: &'a [f64],
    merger_time: Option<f64>,
}

impl<'a> OrbitalTimeSeries<'a> {
    /// Validate and wrap the three aligned arrays.
    ///
    /// # Arguments
    /// * `t` - Sample times
    /// * `phase` - Phase of the (2,2) mode in radians (4π per orbit)
    /// * `omega` - Frequency of the (2,2) mode
    pub fn new(t: &'a [f64], phase: &'a [f64], omega: &'a [f64]) -> Result<Self> {
        let m = t.len();
        if phase.len() != m || omega.len() != m {
            return Err(ExtremaError::InvalidInput(format!(
                "array lengths differ: t={}, phase={}, omega={}",
                m,
                phase.len(),
                omega.len()
            )));
        }
        if m < 3 {
            return Err(ExtremaError::InvalidInput(format!(
                "need at least 3 samples, got {m}"
            )));
        }
        if let Some(j) = (1..m).find(|&j| !(t[j] > t[j - 1])) {
            return Err(ExtremaError::InvalidInput(format!(
                "time must be strictly increasing (t[{}]={}, t[{}]={})",
                j - 1,
                t[j - 1],
                j,
                t[j]
            )));
        }
        if let Some(j) = (1..m).find(|&j| !(phase[j] >= phase[j - 1])) {
            return Err(ExtremaError::InvalidInput(format!(
                "phase must be monotonically increasing (phase[{}]={}, phase[{}]={})",
                j - 1,
                phase[j - 1],
                j,
                phase[j]
            )));
        }
        if let Some(j) = omega.iter().position(|&w| !(w.is_finite() && w > 0.0)) {
            return Err(ExtremaError::InvalidInput(format!(
                "omega must be positive and finite (omega[{}]={})",
                j, omega[j]
            )));
        }
        Ok(Self {
            t,
            phase,
            omega,
            merger_time: None,
        })
    }

    /// Attach the merger time (e.g. the peak of the (2,2) amplitude).
    ///
    /// Without it, the last sample is taken as the merger.
    pub fn with_merger_time(mut self, merger_time: f64) -> Result<Self> {
        if !merger_time.is_finite() {
            return Err(ExtremaError::InvalidInput(format!(
                "merger time must be finite, got {merger_time}"
            )));
        }
        self.merger_time = Some(merger_time);
        Ok(self)
    }

    /// Sample times.
    pub fn t(&self) -> &'a [f64] {
        self.t
    }

    /// Phase of the (2,2) mode.
    pub fn phase(&self) -> &'a [f64] {
        self.phase
    }

    /// Frequency of the (2,2) mode.
    pub fn omega(&self) -> &'a [f64] {
        self.omega
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Always false for a validated series; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Merger time: the attached value or the time of the last sample.
    pub fn merger_time(&self) -> f64 {
        self.merger_time.unwrap_or(self.t[self.t.len() - 1])
    }

    /// Sub-series `[0, end)` that keeps the merger time of the full series.
    pub fn head(&self, end: usize) -> Result<Self> {
        if end < 3 || end > self.len() {
            return Err(ExtremaError::InvalidInput(format!(
                "cannot keep {end} of {} samples",
                self.len()
            )));
        }
        Ok(Self {
            t: &self.t[..end],
            phase: &self.phase[..end],
            omega: &self.omega[..end],
            merger_time: Some(self.merger_time()),
        })
    }

    /// Drop the final `num_orbits` orbits before merger.
    ///
    /// The merger sample is the one closest to [`Self::merger_time`]; the
    /// analysis data ends at the sample whose phase is closest to
    /// `phase_merger - 4π·num_orbits`.
    pub fn exclude_orbits_before_merger(&self, num_orbits: f64) -> Result<Self> {
        let merger_idx = argmin_abs_diff(self.t, self.merger_time()).unwrap_or(self.len() - 1);
        let target = self.phase[merger_idx] - FOUR_PI * num_orbits;
        let end = argmin_abs_diff(self.phase, target).unwrap_or(0);
        self.head(end)
    }
}
