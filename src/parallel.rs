//! Conditional parallel execution for independent extrema passes.
//!
//! With the `parallel` feature, uses rayon to run two closures on the thread
//! pool. Without it (or on targets without threads), the closures run one
//! after the other on the calling thread.
//!
//! # Usage
//!
//! ```ignore
//! use gwecc_extrema::join_maybe_parallel;
//!
//! let (maxima, minima) = join_maybe_parallel!(
//!     || find_extrema(&series, Polarity::Maxima, &config),
//!     || find_extrema(&series, Polarity::Minima, &config),
//! );
//! ```

/// Macro for conditionally parallel evaluation of two independent closures.
///
/// When the `parallel` feature is enabled, uses `rayon::join`.
/// Otherwise, calls `a` then `b` sequentially. Returns `(a(), b())`.
#[macro_export]
macro_rules! join_maybe_parallel {
    ($a:expr, $b:expr $(,)?) => {{
        #[cfg(feature = "parallel")]
        {
            rayon::join($a, $b)
        }
        #[cfg(not(feature = "parallel"))]
        {
            let first = ($a)();
            let second = ($b)();
            (first, second)
        }
    }};
}
