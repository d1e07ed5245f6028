//! # gwecc-extrema
//!
//! Periastron and apastron extrema of the orbital frequency of eccentric
//! compact-binary inspirals.
//!
//! The frequency of the dominant (2,2) gravitational-wave mode grows secularly
//! toward merger and oscillates once per radial period. This crate locates
//! the oscillation's maxima (periastron) and minima (apastron) by:
//! - fitting a power-law trend `A (T - t)^n` to the frequency (bounded
//!   Levenberg–Marquardt)
//! - detecting peaks of the trend-subtracted frequency in a window sized to
//!   hold a fixed number of extrema on each side of a reference index
//! - refitting the trend to the extrema until they stop moving
//! - walking the reference index forward one extremum at a time
//!
//! Sub-sample refinement with local polynomial fits is optional.
//!
//! ## Data Layout
//!
//! Input is three aligned slices wrapped in an [`OrbitalTimeSeries`]: time,
//! phase of the (2,2) mode (4π per orbit) and its frequency.

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod parallel;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extrema;
pub mod helpers;
pub mod optimize;
pub mod peaks;
pub mod refine;
pub mod series;
pub mod simulation;
pub mod tracker;
pub mod trend;

// Re-export commonly used items
pub use config::ExtremaConfig;
pub use error::{ExtremaError, Result};
pub use helpers::{FOUR_PI, NUMERICAL_EPS};
pub use series::{OrbitalTimeSeries, Polarity};

// Re-export the driving loop
pub use extrema::{
    find_extrema, find_extrema_with_observer, find_periastron_apastron, ExtremaTrack,
};

// Re-export tracker and trend types
pub use tracker::{Extremum, TrackerOutcome, TrackerRequest, TrackerStatus, WindowedTracker};
pub use trend::{GlobalFitSetup, TrendBounds, TrendFit, TrendModel, TrendParams};

// Re-export diagnostics types
pub use diagnostics::{ExtremaObserver, WindowRecord, WindowRecorder, WindowSnapshot};

// Re-export simulation types
pub use simulation::{EccentricInspiral, SimulatedInspiral};
