//! Example 02: Tracker Diagnostics
//!
//! Records every window the tracker visits through a custom observer and
//! prints a per-call summary: window bounds, thresholds, extrema counts and
//! the size of each trend refit.

use gwecc_extrema::{
    find_extrema_with_observer, EccentricInspiral, ExtremaConfig, ExtremaObserver, Extremum,
    Polarity, TrendFit, TrendModel, WindowSnapshot,
};
use tracing_subscriber::EnvFilter;

/// Prints windows as they are visited and counts refits.
#[derive(Default)]
struct PrintingObserver {
    refits: usize,
    windows: usize,
}

impl ExtremaObserver for PrintingObserver {
    fn global_fit(&mut self, model: &TrendModel, fit: &TrendFit) {
        println!(
            "global fit: {} (cost {:.3e}, {} evaluations)",
            model.describe(&fit.params),
            fit.cost,
            fit.evaluations
        );
    }

    fn window_iteration(&mut self, s: &WindowSnapshot<'_>) {
        self.windows += 1;
        println!(
            "  iter {:>2}  [{:>6}, {:>6})  ref={:>6}  K={:.4}  width={:>5}  prom={:.2e}  left={} right={}",
            s.iteration, s.idx_lo, s.idx_hi, s.idx_ref, s.k, s.width, s.prominence, s.n_left, s.n_right
        );
    }

    fn trend_refit(&mut self, iteration: usize, fit: &TrendFit, max_delta_omega: f64) {
        self.refits += 1;
        println!(
            "  refit after iter {iteration}: max|d omega|={max_delta_omega:.2e}, {}",
            fit.params
        );
    }

    fn extremum_emitted(&mut self, e: &Extremum) {
        println!("  -> extremum at t={:.3} (index {})", e.t, e.index);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Example 02: Tracker Diagnostics ===\n");

    let sim = EccentricInspiral::default().generate().unwrap();
    let series = sim.series().unwrap();
    let config = ExtremaConfig {
        verbose: true,
        ..Default::default()
    };

    let mut observer = PrintingObserver::default();
    match find_extrema_with_observer(&series, Polarity::Minima, &config, &mut observer) {
        Ok(track) => {
            println!(
                "\n{} minima from {} tracker calls, {} windows, {} refits",
                track.len(),
                track.tracker_calls,
                observer.windows,
                observer.refits
            );
        }
        Err(e) => eprintln!("extrema search failed: {e}"),
    }
}
