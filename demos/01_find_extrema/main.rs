//! Example 01: Finding Extrema
//!
//! Generates an eccentric inspiral with a known periastron advance, locates
//! its periastron and apastron passages, and compares them with the
//! analytic passage times.
//!
//! Set `RUST_LOG=gwecc_extrema=debug` to follow the driving loop.

use gwecc_extrema::{
    find_periastron_apastron, EccentricInspiral, ExtremaConfig, ExtremaTrack, Polarity,
};
use tracing_subscriber::EnvFilter;

fn print_track(label: &str, track: &ExtremaTrack, expected: &[f64]) {
    println!(
        "--- {label}: {} extrema, K={:.4}, {} tracker calls ---",
        track.len(),
        track.k,
        track.tracker_calls
    );
    println!("  trend: {}", track.model.describe(&track.params));
    for e in &track.extrema {
        let t_true = expected
            .iter()
            .cloned()
            .min_by(|a, b| (a - e.t).abs().total_cmp(&(b - e.t).abs()))
            .unwrap_or(f64::NAN);
        println!(
            "  t={:>10.3}  omega={:.6}  phase={:>8.3}  |dt|={:.2e}{}",
            e.t,
            e.omega,
            e.phase,
            (e.t - t_true).abs(),
            if e.refined { "  (refined)" } else { "" }
        );
    }
    println!();
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Example 01: Finding Extrema ===\n");

    let params = EccentricInspiral {
        eccentric_amplitude: 2e-3,
        periastron_advance: 1.08,
        noise_sd: 1e-7,
        seed: Some(7),
        ..Default::default()
    };
    let sim = params.generate().unwrap();
    let series = sim.series().unwrap();
    println!(
        "{} samples, t in [{}, {}], merger at {}\n",
        series.len(),
        params.t_start,
        params.t_end,
        params.merger_time
    );

    let config = ExtremaConfig {
        refine_extrema: true,
        ..Default::default()
    };
    match find_periastron_apastron(&series, &config) {
        Ok((maxima, minima)) => {
            print_track(
                "Periastron (maxima)",
                &maxima,
                &params.extremum_times(Polarity::Maxima),
            );
            print_track(
                "Apastron (minima)",
                &minima,
                &params.extremum_times(Polarity::Minima),
            );
        }
        Err(e) => eprintln!("extrema search failed: {e}"),
    }

    // --- Excluding the last orbits before merger ---
    let config = ExtremaConfig {
        num_orbits_to_exclude_before_merger: Some(2.0),
        ..Default::default()
    };
    match gwecc_extrema::find_extrema(&series, Polarity::Maxima, &config) {
        Ok(track) => println!(
            "Excluding 2 orbits before merger: {} maxima, last at t={:.3}",
            track.len(),
            track.times().last().copied().unwrap_or(f64::NAN)
        ),
        Err(e) => eprintln!("extrema search failed: {e}"),
    }
}
