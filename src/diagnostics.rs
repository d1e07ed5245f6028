//! Read-only observation of intermediate extrema-finding state.
//!
//! Plotting and export tools hook in through [`ExtremaObserver`]. Every
//! callback receives borrowed state and returns nothing, so an observer can
//! record what happened but cannot steer the search.

use crate::tracker::Extremum;
use crate::trend::{TrendFit, TrendModel, TrendParams};

/// State of one tracker iteration, after peak detection.
#[derive(Debug, Clone, Copy)]
pub struct WindowSnapshot<'a> {
    /// 1-based iteration within the tracker call
    pub iteration: usize,
    pub idx_lo: usize,
    /// Exclusive upper bound of the window
    pub idx_hi: usize,
    pub idx_ref: usize,
    /// Periastron-advance estimate used to size the window
    pub k: f64,
    /// Trend parameters the residual was computed with
    pub params: TrendParams,
    /// Minimum peak width in samples
    pub width: f64,
    /// Minimum peak prominence
    pub prominence: f64,
    /// Trend-subtracted frequency over the window
    pub residual: &'a [f64],
    /// Absolute indices of the detected extrema
    pub extrema: &'a [usize],
    pub n_left: usize,
    pub n_right: usize,
}

/// Callbacks invoked while extrema are located.
pub trait ExtremaObserver {
    /// The global warm-start fit finished.
    fn global_fit(&mut self, _model: &TrendModel, _fit: &TrendFit) {}

    /// A tracker iteration detected its extrema.
    fn window_iteration(&mut self, _snapshot: &WindowSnapshot<'_>) {}

    /// The trend was refit to the current extrema.
    fn trend_refit(&mut self, _iteration: usize, _fit: &TrendFit, _max_delta_omega: f64) {}

    /// An extremum was confirmed by the driving loop.
    fn extremum_emitted(&mut self, _extremum: &Extremum) {}
}

impl ExtremaObserver for () {}

/// Owned copy of a [`WindowSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    pub iteration: usize,
    pub idx_lo: usize,
    pub idx_hi: usize,
    pub idx_ref: usize,
    pub k: f64,
    pub params: TrendParams,
    pub width: f64,
    pub prominence: f64,
    pub residual: Vec<f64>,
    pub extrema: Vec<usize>,
    pub n_left: usize,
    pub n_right: usize,
}

impl From<&WindowSnapshot<'_>> for WindowRecord {
    fn from(s: &WindowSnapshot<'_>) -> Self {
        Self {
            iteration: s.iteration,
            idx_lo: s.idx_lo,
            idx_hi: s.idx_hi,
            idx_ref: s.idx_ref,
            k: s.k,
            params: s.params,
            width: s.width,
            prominence: s.prominence,
            residual: s.residual.to_vec(),
            extrema: s.extrema.to_vec(),
            n_left: s.n_left,
            n_right: s.n_right,
        }
    }
}

/// Observer that keeps everything it is shown.
#[derive(Debug, Clone, Default)]
pub struct WindowRecorder {
    pub global_fit: Option<TrendFit>,
    pub windows: Vec<WindowRecord>,
    pub refits: Vec<TrendParams>,
    pub emitted: Vec<Extremum>,
    /// Keep residual arrays (memory grows with the window size)
    pub keep_residuals: bool,
}

impl WindowRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder that also stores the residual of every iteration.
    pub fn with_residuals() -> Self {
        Self {
            keep_residuals: true,
            ..Self::default()
        }
    }

    /// Number of tracker calls seen (iterations restart at 1 on each call).
    pub fn tracker_calls(&self) -> usize {
        self.windows.iter().filter(|w| w.iteration == 1).count()
    }
}

impl ExtremaObserver for WindowRecorder {
    fn global_fit(&mut self, _model: &TrendModel, fit: &TrendFit) {
        self.global_fit = Some(*fit);
    }

    fn window_iteration(&mut self, snapshot: &WindowSnapshot<'_>) {
        let mut record = WindowRecord::from(snapshot);
        if !self.keep_residuals {
            record.residual = Vec::new();
        }
        self.windows.push(record);
    }

    fn trend_refit(&mut self, _iteration: usize, fit: &TrendFit, _max_delta_omega: f64) {
        self.refits.push(fit.params);
    }

    fn extremum_emitted(&mut self, extremum: &Extremum) {
        self.emitted.push(*extremum);
    }
}
