//! Synthetic eccentric inspirals.
//!
//! Generates `(t, phase, omega)` series with a known secular trend and known
//! extrema, for tests, benchmarks and demos.
//!
//! ## Model
//!
//! ```text
//! ω_s(t) = A (T - t)^(-3/8)                 secular frequency
//! φ_s(t) = ∫ ω_s dt                         secular phase (4π per orbit)
//! ψ(t)   = ψ0 + φ_s(t) / (2K)               radial phase (2π per K orbits)
//! ω(t)   = ω_s(t) + ε (cos ψ(t) - 1)
//! φ(t)   = ∫ ω dt
//! ```
//!
//! Periastron passages (`ψ = 2πj`) lie exactly on the secular power law,
//! apastron passages (`ψ = (2j+1)π`) a distance `2ε` below it.

use crate::error::{ExtremaError, Result};
use crate::helpers::cumulative_trapezoid;
use crate::series::{OrbitalTimeSeries, Polarity};
use crate::trend::PN_EXPONENT;
use rand::prelude::*;
use rand_distr::Normal;
use std::f64::consts::PI;

/// Parameters of a synthetic eccentric inspiral.
#[derive(Debug, Clone, PartialEq)]
pub struct EccentricInspiral {
    /// Divergence time `T` of the secular frequency
    pub merger_time: f64,
    /// Amplitude `A` of the secular frequency
    pub amplitude: f64,
    /// Oscillation amplitude `ε` (frequency units)
    pub eccentric_amplitude: f64,
    /// Orbits per radial period `K`
    pub periastron_advance: f64,
    /// Radial phase `ψ0` at the first sample
    pub radial_phase_offset: f64,
    pub t_start: f64,
    pub t_end: f64,
    /// Sample spacing
    pub dt: f64,
    /// Standard deviation of Gaussian noise added to the frequency
    pub noise_sd: f64,
    /// Seed for the noise (entropy when `None`)
    pub seed: Option<u64>,
}

impl Default for EccentricInspiral {
    fn default() -> Self {
        Self {
            merger_time: 0.0,
            amplitude: 1.0,
            eccentric_amplitude: 1e-3,
            periastron_advance: 1.05,
            radial_phase_offset: 1.0,
            t_start: -3000.0,
            t_end: -100.0,
            dt: 0.1,
            noise_sd: 0.0,
            seed: None,
        }
    }
}

/// Generated data.
#[derive(Debug, Clone)]
pub struct SimulatedInspiral {
    pub t: Vec<f64>,
    pub phase: Vec<f64>,
    pub omega: Vec<f64>,
    pub merger_time: f64,
}

impl SimulatedInspiral {
    /// Validated view with the merger time attached.
    pub fn series(&self) -> Result<OrbitalTimeSeries<'_>> {
        OrbitalTimeSeries::new(&self.t, &self.phase, &self.omega)?.with_merger_time(self.merger_time)
    }

    /// First `n` samples (keeps the merger time).
    pub fn truncated(&self, n: usize) -> Self {
        let n = n.min(self.t.len());
        Self {
            t: self.t[..n].to_vec(),
            phase: self.phase[..n].to_vec(),
            omega: self.omega[..n].to_vec(),
            merger_time: self.merger_time,
        }
    }
}

impl EccentricInspiral {
    /// Secular frequency `ω_s(t)`.
    pub fn secular_frequency(&self, t: f64) -> f64 {
        self.amplitude * (self.merger_time - t).powf(PN_EXPONENT)
    }

    /// Secular phase `φ_s(t)`, zero at `t_start`.
    pub fn secular_phase(&self, t: f64) -> f64 {
        let p = 1.0 + PN_EXPONENT;
        self.amplitude / p
            * ((self.merger_time - self.t_start).powf(p) - (self.merger_time - t).powf(p))
    }

    /// Radial phase `ψ(t)`.
    pub fn radial_phase(&self, t: f64) -> f64 {
        self.radial_phase_offset + self.secular_phase(t) / (2.0 * self.periastron_advance)
    }

    fn validate(&self) -> Result<()> {
        if !(self.t_start < self.t_end && self.t_end < self.merger_time) {
            return Err(ExtremaError::InvalidConfig(format!(
                "need t_start < t_end < merger_time, got {} / {} / {}",
                self.t_start, self.t_end, self.merger_time
            )));
        }
        if !(self.dt > 0.0 && (self.t_end - self.t_start) / self.dt >= 3.0) {
            return Err(ExtremaError::InvalidConfig(format!(
                "sample spacing {} does not fit the interval",
                self.dt
            )));
        }
        if !(self.amplitude > 0.0 && self.periastron_advance > 0.0) {
            return Err(ExtremaError::InvalidConfig(
                "amplitude and periastron advance must be positive".to_string(),
            ));
        }
        // keep the frequency positive
        let min_secular = self.secular_frequency(self.t_start);
        if !(self.eccentric_amplitude >= 0.0 && 2.0 * self.eccentric_amplitude < min_secular) {
            return Err(ExtremaError::InvalidConfig(format!(
                "eccentric amplitude {} must lie in [0, {})",
                self.eccentric_amplitude,
                0.5 * min_secular
            )));
        }
        if self.noise_sd < 0.0 {
            return Err(ExtremaError::InvalidConfig(format!(
                "noise_sd must be non-negative, got {}",
                self.noise_sd
            )));
        }
        Ok(())
    }

    /// Sample the inspiral on `t_start, t_start + dt, ...` up to `t_end`.
    pub fn generate(&self) -> Result<SimulatedInspiral> {
        self.validate()?;
        let m = ((self.t_end - self.t_start) / self.dt).floor() as usize + 1;
        let t: Vec<f64> = (0..m).map(|i| self.t_start + i as f64 * self.dt).collect();

        let mut omega: Vec<f64> = t
            .iter()
            .map(|&ti| {
                self.secular_frequency(ti)
                    + self.eccentric_amplitude * (self.radial_phase(ti).cos() - 1.0)
            })
            .collect();

        if self.noise_sd > 0.0 {
            let mut rng = match self.seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            let normal = Normal::new(0.0, self.noise_sd)
                .map_err(|e| ExtremaError::InvalidConfig(format!("noise distribution: {e}")))?;
            for w in omega.iter_mut() {
                *w += rng.sample::<f64, _>(normal);
            }
        }

        let phase = cumulative_trapezoid(&omega, &t, 0.0);
        Ok(SimulatedInspiral {
            t,
            phase,
            omega,
            merger_time: self.merger_time,
        })
    }

    /// Times of the noise-free extrema in `[t_start, t_end]`.
    ///
    /// Maxima where `ψ = 2πj`, minima where `ψ = (2j+1)π`.
    pub fn extremum_times(&self, polarity: Polarity) -> Vec<f64> {
        let offset = match polarity {
            Polarity::Maxima => 0.0,
            Polarity::Minima => PI,
        };
        let p = 1.0 + PN_EXPONENT;
        let tau_start = (self.merger_time - self.t_start).powf(p);
        let psi_end = self.radial_phase(self.t_end);

        let mut times = Vec::new();
        let mut j = ((self.radial_phase_offset - offset) / (2.0 * PI)).ceil();
        loop {
            let psi = 2.0 * PI * j + offset;
            if psi > psi_end {
                break;
            }
            let secular = 2.0 * self.periastron_advance * (psi - self.radial_phase_offset);
            let base = tau_start - p * secular / self.amplitude;
            times.push(self.merger_time - base.powf(1.0 / p));
            j += 1.0;
        }
        times
    }
}
