//! Error type shared by all extrema-finding operations.
//!
//! Running out of extrema near merger is not an error: the tracker and the
//! driving loop report it by returning short (or empty) results. Everything
//! in [`ExtremaError`] is fatal for the current run and carries enough state
//! to diagnose the failure without re-running.

use crate::trend::TrendParams;

/// Result type for extrema-finding operations.
pub type Result<T> = std::result::Result<T, ExtremaError>;

/// Fatal conditions raised while locating orbital-frequency extrema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtremaError {
    /// Extrema type string was not one of maxima/peaks/minima/troughs.
    #[error("extrema_type='{0}' unknown")]
    UnknownExtremaType(String),

    /// Input arrays are inconsistent (length mismatch, non-monotonic, non-positive).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value or bound is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Not enough data to seed the first search window.
    #[error("data set too short: need phase beyond {required_phase:.3}, last phase is {available_phase:.3}")]
    InsufficientData {
        /// Phase the seed reference index has to exceed
        required_phase: f64,
        /// Last phase value of the analysed data
        available_phase: f64,
    },

    /// The trend model was evaluated at or beyond its divergence time.
    #[error(
        "trend model reached parameters where merger time T is within the time series: \
         {params}, max(t)={t_max}"
    )]
    DivergenceViolation {
        /// Parameters at which the model was evaluated
        params: TrendParams,
        /// Largest time value in the evaluation request
        t_max: f64,
    },

    /// The least-squares trend fit exhausted its evaluation budget.
    #[error("trend fit did not converge after {evaluations} evaluations (cost {cost:.3e}, last {params})")]
    FitNonConvergence {
        /// Number of residual evaluations spent
        evaluations: usize,
        /// Last accepted parameters
        params: TrendParams,
        /// Sum of squared residuals at `params`
        cost: f64,
    },

    /// Fewer extrema exist before the reference index than requested, and the
    /// reference index may not be advanced.
    #[error(
        "could not identify {needed} extrema to the left of idx_ref={idx_ref} \
         (found {found} in [{idx_lo}, {idx_hi}) after {iteration} iterations)"
    )]
    NotEnoughExtremaBefore {
        /// Requested number of extrema before the reference index
        needed: usize,
        /// Number found
        found: usize,
        /// Reference index
        idx_ref: usize,
        /// Lower window bound at failure
        idx_lo: usize,
        /// Upper window bound (exclusive) at failure
        idx_hi: usize,
        /// Tracker iteration at failure
        iteration: usize,
    },

    /// The driving loop exceeded its step cap.
    #[error(
        "detected more than {steps} extrema (idx_ref={idx_ref}, K={k:.4}, {params}); \
         this has triggered a safety exception"
    )]
    RunawayIteration {
        /// Steps taken when the cap tripped
        steps: usize,
        /// Reference index at that point
        idx_ref: usize,
        /// Periastron-advance estimate of the last tracker call
        k: f64,
        /// Trend parameters of the last tracker call
        params: TrendParams,
    },
}
