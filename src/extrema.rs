//! Periastron and apastron extrema of the orbital frequency.
//!
//! The driving loop fits the trend once over the first orbits of the data,
//! seeds a reference index `N` radial periods in, and then walks the
//! reference index forward one extremum at a time. Each step asks the
//! [`WindowedTracker`] for `N` extrema before and `N + 1` after the reference
//! index and emits the middle one, so every emitted extremum was located with
//! a trend fit centred on it. The walk ends when the tracker can no longer
//! return a full window (the end of the data is near).
//!
//! # Example
//!
//! ```
//! use gwecc_extrema::{find_extrema, EccentricInspiral, ExtremaConfig, Polarity};
//!
//! let sim = EccentricInspiral::default().generate().unwrap();
//! let series = sim.series().unwrap();
//! let track = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();
//! assert!(track.extrema.len() > 5);
//! ```

use crate::config::ExtremaConfig;
use crate::diagnostics::ExtremaObserver;
use crate::error::{ExtremaError, Result};
use crate::helpers::{first_index_above, FOUR_PI};
use crate::join_maybe_parallel;
use crate::series::{OrbitalTimeSeries, Polarity};
use crate::tracker::{Extremum, TrackerRequest, WindowedTracker};
use crate::trend::{GlobalFitSetup, TrendModel, TrendParams};
use tracing::{debug, warn};

/// Extrema of one polarity over the whole analysed series.
#[derive(Debug, Clone)]
pub struct ExtremaTrack {
    pub polarity: Polarity,
    /// Extrema in strictly increasing time order
    pub extrema: Vec<Extremum>,
    /// Trend parameters of the last tracker call
    pub params: TrendParams,
    /// Model the parameters belong to
    pub model: TrendModel,
    /// Periastron-advance estimate of the last tracker call
    pub k: f64,
    /// Number of tracker calls made
    pub tracker_calls: usize,
}

impl ExtremaTrack {
    pub fn len(&self) -> usize {
        self.extrema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extrema.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.extrema.iter().map(|e| e.t).collect()
    }

    pub fn omegas(&self) -> Vec<f64> {
        self.extrema.iter().map(|e| e.omega).collect()
    }

    pub fn phases(&self) -> Vec<f64> {
        self.extrema.iter().map(|e| e.phase).collect()
    }

    /// Grid indices into the analysed series.
    pub fn indices(&self) -> Vec<usize> {
        self.extrema.iter().map(|e| e.index).collect()
    }
}

/// Locate all extrema of one polarity.
///
/// # Arguments
/// * `series` - Time, phase and frequency of the (2,2) mode
/// * `polarity` - Maxima (periastron) or minima (apastron)
/// * `config` - Run configuration
///
/// # Errors
/// - [`ExtremaError::InvalidConfig`] for an invalid configuration
/// - [`ExtremaError::InsufficientData`] if the data does not reach `N`
///   radial periods past its start
/// - [`ExtremaError::RunawayIteration`] after `config.max_steps` tracker calls
/// - trend fit failures
pub fn find_extrema(
    series: &OrbitalTimeSeries<'_>,
    polarity: Polarity,
    config: &ExtremaConfig,
) -> Result<ExtremaTrack> {
    find_extrema_with_observer(series, polarity, config, &mut ())
}

/// [`find_extrema`] reporting intermediate state to `observer`.
pub fn find_extrema_with_observer(
    series: &OrbitalTimeSeries<'_>,
    polarity: Polarity,
    config: &ExtremaConfig,
    observer: &mut dyn ExtremaObserver,
) -> Result<ExtremaTrack> {
    config.validate()?;
    let series = match config.num_orbits_to_exclude_before_merger {
        Some(orbits) => {
            let trimmed = series.exclude_orbits_before_merger(orbits)?;
            debug!(
                orbits,
                kept = trimmed.len(),
                of = series.len(),
                "excluded orbits before merger"
            );
            trimmed
        }
        None => *series,
    };
    let t = series.t();
    let phase = series.phase();
    let m = series.len();
    let n = config.extrema_per_side;

    let setup = GlobalFitSetup::from_series(&series, config.global_fit_orbits)?;
    let idx_end = setup.idx_end;
    let global = setup.model.fit(
        &t[..idx_end],
        &series.omega()[..idx_end],
        &setup.initial,
        &setup.bounds,
        config.max_fit_evaluations,
    )?;
    observer.global_fit(&setup.model, &global);
    debug!(
        %polarity,
        idx_end,
        cost = global.cost,
        evaluations = global.evaluations,
        trend = %setup.model.describe(&global.params),
        "global trend fit"
    );

    let mut k = config.initial_periastron_advance;
    let mut params = global.params;
    let required_phase = phase[0] + k * (n as f64 - 0.001) * FOUR_PI;
    let mut idx_ref = first_index_above(phase, required_phase);
    if idx_ref == 0 || idx_ref >= m {
        return Err(ExtremaError::InsufficientData {
            required_phase,
            available_phase: phase[m - 1],
        });
    }

    let tracker = WindowedTracker::new(series, setup.model, setup.bounds, config);
    let mut extrema: Vec<Extremum> = Vec::new();
    let mut steps = 0;

    loop {
        if steps >= config.max_steps {
            return Err(ExtremaError::RunawayIteration {
                steps,
                idx_ref,
                k,
                params,
            });
        }
        steps += 1;

        let request = TrackerRequest {
            idx_ref,
            polarity,
            n_before: n,
            n_after: n + 1,
            k,
            params,
            allow_advance_reference: true,
        };
        let outcome = tracker.track(&request, observer)?;
        params = outcome.params;
        k = outcome.k;
        let found = &outcome.extrema;

        if found.len() + 1 >= 2 * n {
            if steps == 1 {
                for extremum in &found[..n] {
                    emit(&mut extrema, *extremum, observer);
                }
            }
            if let Some(extremum) = found.get(n) {
                emit(&mut extrema, *extremum, observer);
            }
        }

        if found.len() < 2 * n + 1 {
            debug!(
                %polarity,
                found = found.len(),
                status = ?outcome.status,
                emitted = extrema.len(),
                "end of data reached"
            );
            break;
        }
        idx_ref = (found[n].index + found[n + 1].index) / 2;
    }

    debug!(
        %polarity,
        emitted = extrema.len(),
        tracker_calls = steps,
        k,
        trend = %setup.model.describe(&params),
        "extrema search finished"
    );
    Ok(ExtremaTrack {
        polarity,
        extrema,
        params,
        model: setup.model,
        k,
        tracker_calls: steps,
    })
}

/// Append `extremum` unless it would break strictly increasing time order.
fn emit(extrema: &mut Vec<Extremum>, extremum: Extremum, observer: &mut dyn ExtremaObserver) {
    if let Some(last) = extrema.last() {
        if extremum.t <= last.t {
            warn!(
                t = extremum.t,
                last_t = last.t,
                index = extremum.index,
                "dropping extremum that does not advance in time"
            );
            return;
        }
    }
    debug!(
        index = extremum.index,
        t = extremum.t,
        omega = extremum.omega,
        refined = extremum.refined,
        "extremum"
    );
    observer.extremum_emitted(&extremum);
    extrema.push(extremum);
}

/// Maxima and minima of the same series.
///
/// The two passes are independent; with the `parallel` feature they run on
/// the rayon pool.
pub fn find_periastron_apastron(
    series: &OrbitalTimeSeries<'_>,
    config: &ExtremaConfig,
) -> Result<(ExtremaTrack, ExtremaTrack)> {
    let (maxima, minima) = join_maybe_parallel!(
        || find_extrema(series, Polarity::Maxima, config),
        || find_extrema(series, Polarity::Minima, config),
    );
    Ok((maxima?, minima?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WindowRecorder;
    use crate::simulation::EccentricInspiral;

    #[test]
    fn test_find_extrema_matches_analytic_maxima() {
        let params = EccentricInspiral::default();
        let sim = params.generate().unwrap();
        let series = sim.series().unwrap();
        let track = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();
        let expected = params.extremum_times(Polarity::Maxima);

        assert!(track.len() >= 8, "only {} maxima", track.len());
        assert_eq!(track.polarity, Polarity::Maxima);
        for e in &track.extrema {
            let nearest = expected
                .iter()
                .cloned()
                .min_by(|a, b| (a - e.t).abs().total_cmp(&(b - e.t).abs()))
                .unwrap();
            assert!(
                (nearest - e.t).abs() <= 2.0 * params.dt,
                "extremum at {} but nearest analytic maximum at {}",
                e.t,
                nearest
            );
        }
    }

    #[test]
    fn test_emitted_times_strictly_increase() {
        let sim = EccentricInspiral::default().generate().unwrap();
        let series = sim.series().unwrap();
        let track = find_extrema(&series, Polarity::Minima, &ExtremaConfig::default()).unwrap();
        for w in track.extrema.windows(2) {
            assert!(w[1].t > w[0].t, "{} then {}", w[0].t, w[1].t);
        }
        assert_eq!(track.times().len(), track.indices().len());
    }

    #[test]
    fn test_observer_sees_every_emission() {
        let sim = EccentricInspiral::default().generate().unwrap();
        let series = sim.series().unwrap();
        let mut recorder = WindowRecorder::new();
        let track = find_extrema_with_observer(
            &series,
            Polarity::Maxima,
            &ExtremaConfig::default(),
            &mut recorder,
        )
        .unwrap();
        assert!(recorder.global_fit.is_some());
        assert_eq!(recorder.emitted, track.extrema);
        assert_eq!(recorder.tracker_calls(), track.tracker_calls);
    }

    #[test]
    fn test_insufficient_data_is_fatal() {
        // one radial period of data cannot seed a window with N = 3
        let params = EccentricInspiral {
            t_start: -300.0,
            ..Default::default()
        };
        let sim = params.generate().unwrap();
        let series = sim.series().unwrap();
        let result = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default());
        assert!(
            matches!(result, Err(ExtremaError::InsufficientData { .. })),
            "{result:?}"
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let sim = EccentricInspiral::default().generate().unwrap();
        let series = sim.series().unwrap();
        let config = ExtremaConfig {
            extrema_per_side: 0,
            ..Default::default()
        };
        assert!(matches!(
            find_extrema(&series, Polarity::Maxima, &config),
            Err(ExtremaError::InvalidConfig(_))
        ));
    }
}
