//! End-to-end checks on synthetic eccentric inspirals.
//!
//! The generator in `gwecc_extrema::simulation` places periastron passages
//! exactly on a known power-law trend, so the extrema times are known in
//! closed form and every property of the driving loop and the tracker can be
//! checked against them.
//!
//! Run: cargo test --test synthetic_inspiral

use gwecc_extrema::helpers::first_index_above;
use gwecc_extrema::{
    find_extrema, find_extrema_with_observer, find_periastron_apastron, EccentricInspiral,
    ExtremaConfig, ExtremaError, ExtremaTrack, GlobalFitSetup, OrbitalTimeSeries, Polarity,
    SimulatedInspiral, TrackerRequest, TrackerStatus, TrendParams, WindowRecorder,
    WindowedTracker, FOUR_PI,
};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn default_inspiral() -> (EccentricInspiral, SimulatedInspiral) {
    let params = EccentricInspiral::default();
    let sim = params.generate().unwrap();
    (params, sim)
}

fn nearest(values: &[f64], target: f64) -> f64 {
    values
        .iter()
        .cloned()
        .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
        .unwrap()
}

fn assert_near_analytic(track: &ExtremaTrack, expected: &[f64], tol: f64, label: &str) {
    for e in &track.extrema {
        let t_true = nearest(expected, e.t);
        assert!(
            (e.t - t_true).abs() <= tol,
            "{}: extremum at t={} (index {}), analytic t={}",
            label,
            e.t,
            e.index,
            t_true
        );
    }
}

fn global_params(
    series: &OrbitalTimeSeries<'_>,
    config: &ExtremaConfig,
) -> (GlobalFitSetup, TrendParams) {
    let setup = GlobalFitSetup::from_series(series, config.global_fit_orbits).unwrap();
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
    (setup, fit.params)
}

// ─── Recovery ───────────────────────────────────────────────────────────────

#[test]
fn test_recovers_periastron_times() {
    let (params, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let track = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();
    let expected = params.extremum_times(Polarity::Maxima);

    // all but the last N + 1 analytic maxima can be emitted
    assert!(
        track.len() + 5 >= expected.len(),
        "{} of {} maxima emitted",
        track.len(),
        expected.len()
    );
    assert_near_analytic(&track, &expected, params.dt, "maxima");
}

#[test]
fn test_recovers_apastron_times() {
    let (params, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let track = find_extrema(&series, Polarity::Minima, &ExtremaConfig::default()).unwrap();
    assert!(track.len() >= 8, "only {} minima", track.len());
    assert_near_analytic(
        &track,
        &params.extremum_times(Polarity::Minima),
        params.dt,
        "minima",
    );
    // apastron frequencies sit 2ε below the secular trend
    for e in &track.extrema {
        let secular = params.secular_frequency(e.t);
        assert!(
            (secular - e.omega - 2.0 * params.eccentric_amplitude).abs() < 1e-5,
            "omega={} at t={}",
            e.omega,
            e.t
        );
    }
}

#[test]
fn test_refined_extrema_are_sub_sample_accurate() {
    let (params, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let config = ExtremaConfig {
        refine_extrema: true,
        ..Default::default()
    };
    let track = find_extrema(&series, Polarity::Maxima, &config).unwrap();
    let expected = params.extremum_times(Polarity::Maxima);

    let refined: Vec<_> = track.extrema.iter().filter(|e| e.refined).collect();
    assert!(!refined.is_empty(), "no extremum had enough samples to refine");
    for e in refined {
        let t_true = nearest(&expected, e.t);
        assert!(
            (e.t - t_true).abs() < 1e-3,
            "refined t={} vs analytic {}",
            e.t,
            t_true
        );
        // periastron frequencies lie on the secular trend
        let secular = params.secular_frequency(e.t);
        assert!(
            (e.omega - secular).abs() < 1e-6,
            "omega={} vs secular {}",
            e.omega,
            secular
        );
    }
    for w in track.extrema.windows(2) {
        assert!(w[1].t > w[0].t);
    }
}

#[test]
fn test_both_polarities_interleave() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let (maxima, minima) = find_periastron_apastron(&series, &ExtremaConfig::default()).unwrap();
    assert_eq!(maxima.polarity, Polarity::Maxima);
    assert_eq!(minima.polarity, Polarity::Minima);
    assert!((maxima.len() as i64 - minima.len() as i64).abs() <= 2);

    // exactly one minimum between consecutive maxima, within the minima's span
    let t_min = minima.times();
    let last_min = t_min[t_min.len() - 1];
    for w in maxima.times().windows(2) {
        if w[1] > last_min {
            break;
        }
        let inside = t_min.iter().filter(|&&t| w[0] < t && t < w[1]).count();
        assert_eq!(inside, 1, "minima between maxima at {} and {}", w[0], w[1]);
    }
}

// ─── Driving-loop properties ────────────────────────────────────────────────

#[test]
fn test_emitted_times_strictly_increase() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    for polarity in [Polarity::Maxima, Polarity::Minima] {
        let track = find_extrema(&series, polarity, &ExtremaConfig::default()).unwrap();
        let times = track.times();
        for w in times.windows(2) {
            assert!(w[1] > w[0], "{polarity}: {} then {}", w[0], w[1]);
        }
        assert!(track.phases().windows(2).all(|w| w[1] > w[0]));
    }
}

#[test]
fn test_pure_trend_has_no_extrema() {
    let params = EccentricInspiral {
        eccentric_amplitude: 0.0,
        ..Default::default()
    };
    let sim = params.generate().unwrap();
    let series = sim.series().unwrap();
    let track = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();
    assert!(track.is_empty(), "found {:?}", track.times());
}

#[test]
fn test_truncated_data_stops_cleanly() {
    let (params, sim) = default_inspiral();
    let full_series = sim.series().unwrap();
    let full = find_extrema(&full_series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();

    let short = sim.truncated(sim.t.len() * 7 / 10);
    let series = short.series().unwrap();
    let track = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();
    assert!(
        track.len() < full.len(),
        "{} extrema on truncated data, {} on full data",
        track.len(),
        full.len()
    );
    let t_end = short.t[short.t.len() - 1];
    assert!(track.times().iter().all(|&t| t < t_end));
    assert_near_analytic(
        &track,
        &params.extremum_times(Polarity::Maxima),
        params.dt,
        "truncated",
    );
}

#[test]
fn test_excluding_orbits_before_merger() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let full = find_extrema(&series, Polarity::Maxima, &ExtremaConfig::default()).unwrap();

    let config = ExtremaConfig {
        num_orbits_to_exclude_before_merger: Some(3.0),
        ..Default::default()
    };
    let track = find_extrema(&series, Polarity::Maxima, &config).unwrap();
    let phase_cut = sim.phase[sim.phase.len() - 1] - 3.0 * FOUR_PI;
    assert!(track.len() <= full.len());
    assert!(
        track.phases().iter().all(|&ph| ph <= phase_cut),
        "extremum past the excluded orbits"
    );
}

#[test]
fn test_observer_records_windows_and_refits() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let mut recorder = WindowRecorder::new();
    let track = find_extrema_with_observer(
        &series,
        Polarity::Maxima,
        &ExtremaConfig::default(),
        &mut recorder,
    )
    .unwrap();

    assert_eq!(recorder.tracker_calls(), track.tracker_calls);
    assert!(!recorder.refits.is_empty());
    assert_eq!(recorder.emitted.len(), track.len());
    for w in &recorder.windows {
        assert!(w.idx_lo < w.idx_hi, "empty window {:?}", (w.idx_lo, w.idx_hi));
        assert!(w.width > 0.0 && w.prominence > 0.0);
        assert_eq!(w.n_left + w.n_right, w.extrema.len());
    }
}

#[test]
fn test_step_cap_is_fatal() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let config = ExtremaConfig {
        max_steps: 3,
        ..Default::default()
    };
    match find_extrema(&series, Polarity::Maxima, &config) {
        Err(ExtremaError::RunawayIteration {
            steps,
            idx_ref,
            k,
            params,
        }) => {
            assert_eq!(steps, 3);
            assert!(idx_ref > 0 && idx_ref < series.len());
            assert!(k > 0.9 && k < 1.3, "K={k}");
            assert!(params.f0 > 0.0 && params.merger_time.is_finite());
        }
        other => panic!("expected RunawayIteration, got {other:?}"),
    }
}

// ─── Tracker properties ─────────────────────────────────────────────────────

#[test]
fn test_converged_windows_hold_requested_counts() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let config = ExtremaConfig::default();
    let track = find_extrema(&series, Polarity::Maxima, &config).unwrap();
    let (setup, params) = global_params(&series, &config);
    let tracker = WindowedTracker::new(series, setup.model, setup.bounds, &config);

    // reference points between emitted maxima, well away from the end
    let indices = track.indices();
    let mut checked = 0;
    for pair in indices.windows(2).skip(3).take(4) {
        let request = TrackerRequest {
            idx_ref: (pair[0] + pair[1]) / 2,
            polarity: Polarity::Maxima,
            n_before: 3,
            n_after: 4,
            k: track.k,
            params,
            allow_advance_reference: false,
        };
        let outcome = tracker.track(&request, &mut ()).unwrap();
        if outcome.status != TrackerStatus::Converged {
            continue;
        }
        let before = outcome.indices().iter().filter(|&&i| i < outcome.idx_ref).count();
        assert_eq!(before, 3);
        assert_eq!(outcome.extrema.len() - before, 4);
        checked += 1;
    }
    assert!(checked > 0, "no converged tracker call");
}

#[test]
fn test_converged_tracker_call_is_idempotent() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let config = ExtremaConfig::default();
    let (setup, params) = global_params(&series, &config);
    let tracker = WindowedTracker::new(series, setup.model, setup.bounds, &config);

    let idx_ref = first_index_above(series.phase(), series.phase()[0] + 1.2 * 2.999 * FOUR_PI);
    let request = TrackerRequest {
        idx_ref,
        polarity: Polarity::Maxima,
        n_before: 3,
        n_after: 4,
        k: 1.2,
        params,
        allow_advance_reference: true,
    };
    let first = tracker.track(&request, &mut ()).unwrap();
    assert_eq!(first.status, TrackerStatus::Converged);

    let again = TrackerRequest {
        idx_ref: first.idx_ref,
        k: first.k,
        params: first.params,
        ..request
    };
    let second = tracker.track(&again, &mut ()).unwrap();
    assert_eq!(second.indices(), first.indices());
    assert_eq!(second.idx_ref, first.idx_ref);
    assert!(
        (second.k - first.k).abs() < 1e-12,
        "K moved from {} to {}",
        first.k,
        second.k
    );
}

#[test]
fn test_not_enough_extrema_before_is_fatal() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let config = ExtremaConfig::default();
    let (setup, params) = global_params(&series, &config);
    let tracker = WindowedTracker::new(series, setup.model, setup.bounds, &config);

    // about 1.5 radial periods into the data: at most two maxima precede it
    let idx_ref = first_index_above(series.phase(), series.phase()[0] + 1.05 * 1.5 * FOUR_PI);
    let request = TrackerRequest {
        idx_ref,
        polarity: Polarity::Maxima,
        n_before: 3,
        n_after: 4,
        k: 1.2,
        params,
        allow_advance_reference: false,
    };
    match tracker.track(&request, &mut ()) {
        Err(ExtremaError::NotEnoughExtremaBefore {
            needed,
            found,
            idx_lo,
            ..
        }) => {
            assert_eq!(needed, 3);
            assert!(found < 3);
            assert_eq!(idx_lo, 0);
        }
        other => panic!("expected NotEnoughExtremaBefore, got {other:?}"),
    }
}

#[test]
fn test_trend_divergence_inside_window_propagates() {
    let (_, sim) = default_inspiral();
    let series = sim.series().unwrap();
    let config = ExtremaConfig::default();
    let (setup, params) = global_params(&series, &config);
    let tracker = WindowedTracker::new(series, setup.model, setup.bounds, &config);

    let idx_ref = first_index_above(series.phase(), series.phase()[0] + 1.2 * 2.999 * FOUR_PI);
    let t_inside = series.t()[idx_ref];
    let request = TrackerRequest {
        idx_ref,
        polarity: Polarity::Maxima,
        n_before: 3,
        n_after: 4,
        k: 1.2,
        params: TrendParams::new(params.f0, params.f1, t_inside),
        allow_advance_reference: true,
    };
    match tracker.track(&request, &mut ()) {
        Err(ExtremaError::DivergenceViolation { params, t_max }) => {
            assert_eq!(params.merger_time, t_inside);
            assert!(t_max >= t_inside);
        }
        other => panic!("expected DivergenceViolation, got {other:?}"),
    }
}
