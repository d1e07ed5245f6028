//! Helper functions for index searches and common numerical operations.

use std::f64::consts::PI;

/// Small epsilon for numerical comparisons (e.g., avoiding division by zero).
pub const NUMERICAL_EPS: f64 = 1e-10;

/// Phase of the dominant (2,2) mode accumulated over one orbit.
pub const FOUR_PI: f64 = 4.0 * PI;

/// First index whose value is strictly greater than `threshold`.
///
/// `values` must be non-decreasing (orbital phase, time). Returns
/// `values.len()` when no element exceeds the threshold.
///
/// # Arguments
/// * `values` - Non-decreasing sequence
/// * `threshold` - Value to exceed
///
/// # Returns
/// Index in `0..=values.len()`
pub fn first_index_above(values: &[f64], threshold: f64) -> usize {
    values.partition_point(|&v| v <= threshold)
}

/// Index of the element closest to `target` (first one on ties).
///
/// Returns `None` for an empty slice.
pub fn argmin_abs_diff(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        let d = (v - target).abs();
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Largest spacing between consecutive samples.
///
/// Returns 0.0 for fewer than two samples.
pub fn max_spacing(argvals: &[f64]) -> f64 {
    argvals
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(0.0, f64::max)
}

/// Peak-to-trough range `max - min` of a slice (0.0 when empty).
pub fn value_range(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut min_val = f64::INFINITY;
    let mut max_val = f64::NEG_INFINITY;
    for &v in values {
        min_val = min_val.min(v);
        max_val = max_val.max(v);
    }
    max_val - min_val
}

/// Cumulative trapezoidal integral of `values` over `argvals`, starting at `initial`.
///
/// # Arguments
/// * `values` - Integrand samples
/// * `argvals` - Sample positions (same length as `values`)
/// * `initial` - Value of the integral at `argvals[0]`
///
/// # Returns
/// Running integral with the same length as the inputs
pub fn cumulative_trapezoid(values: &[f64], argvals: &[f64], initial: f64) -> Vec<f64> {
    let n = values.len().min(argvals.len());
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }
    let mut acc = initial;
    out.push(acc);
    for i in 1..n {
        acc += 0.5 * (values[i] + values[i - 1]) * (argvals[i] - argvals[i - 1]);
        out.push(acc);
    }
    out
}
