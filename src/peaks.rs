//! Peak detection with prominence and width filters.
//!
//! Follows the conventions of `scipy.signal.find_peaks`:
//! - flat peaks (plateaus) are reported at their middle sample
//! - prominence is the height above the higher of the two lowest points
//!   reachable on either side without crossing a higher sample
//! - width is measured at `rel_height` of the prominence below the peak,
//!   with linear interpolation between samples, in units of samples

/// Filters applied by [`find_peaks`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakOptions {
    /// Minimum prominence
    pub prominence: Option<f64>,
    /// Minimum width in samples
    pub width: Option<f64>,
    /// Relative height at which widths are measured
    pub rel_height: f64,
}

impl Default for PeakOptions {
    fn default() -> Self {
        Self {
            prominence: None,
            width: None,
            rel_height: 0.5,
        }
    }
}

/// Prominences and bases of a set of peaks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakProminences {
    pub prominences: Vec<f64>,
    pub left_bases: Vec<usize>,
    pub right_bases: Vec<usize>,
}

/// Widths of a set of peaks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakWidths {
    /// Width in samples
    pub widths: Vec<f64>,
    /// Height at which each width was measured
    pub width_heights: Vec<f64>,
    /// Interpolated left crossing (fractional index)
    pub left_ips: Vec<f64>,
    /// Interpolated right crossing (fractional index)
    pub right_ips: Vec<f64>,
}

/// Peaks that passed all filters, with their properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Peaks {
    pub indices: Vec<usize>,
    pub prominences: Vec<f64>,
    pub widths: Vec<f64>,
}

impl Peaks {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Indices of local maxima, plateaus reported at their (lower) middle.
///
/// The first and last samples are never peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                peaks.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Prominence of each peak in `x`.
pub fn peak_prominences(x: &[f64], peaks: &[usize]) -> PeakProminences {
    let mut out = PeakProminences {
        prominences: Vec::with_capacity(peaks.len()),
        left_bases: Vec::with_capacity(peaks.len()),
        right_bases: Vec::with_capacity(peaks.len()),
    };

    for &peak in peaks {
        let peak_val = x[peak];

        let mut left_min = peak_val;
        let mut left_base = peak;
        let mut i = peak;
        loop {
            if x[i] > peak_val {
                break;
            }
            if x[i] < left_min {
                left_min = x[i];
                left_base = i;
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }

        let mut right_min = peak_val;
        let mut right_base = peak;
        for (j, &v) in x.iter().enumerate().skip(peak) {
            if v > peak_val {
                break;
            }
            if v < right_min {
                right_min = v;
                right_base = j;
            }
        }

        out.prominences.push(peak_val - left_min.max(right_min));
        out.left_bases.push(left_base);
        out.right_bases.push(right_base);
    }
    out
}

/// Width of each peak at `rel_height` of its prominence.
pub fn peak_widths(
    x: &[f64],
    peaks: &[usize],
    prominences: &PeakProminences,
    rel_height: f64,
) -> PeakWidths {
    let mut out = PeakWidths::default();
    for (k, &peak) in peaks.iter().enumerate() {
        let i_min = prominences.left_bases[k];
        let i_max = prominences.right_bases[k];
        let height = x[peak] - prominences.prominences[k] * rel_height;

        let mut i = peak;
        while i_min < i && height < x[i] {
            i -= 1;
        }
        let mut left_ip = i as f64;
        if x[i] < height {
            left_ip += (height - x[i]) / (x[i + 1] - x[i]);
        }

        let mut i = peak;
        while i < i_max && height < x[i] {
            i += 1;
        }
        let mut right_ip = i as f64;
        if x[i] < height {
            right_ip -= (height - x[i]) / (x[i - 1] - x[i]);
        }

        out.widths.push(right_ip - left_ip);
        out.width_heights.push(height);
        out.left_ips.push(left_ip);
        out.right_ips.push(right_ip);
    }
    out
}

/// Find peaks in `x` that satisfy the prominence and width filters.
///
/// # Arguments
/// * `x` - Signal
/// * `options` - Minimum prominence / width and the width measurement height
///
/// # Returns
/// Surviving peaks in increasing index order, with their properties.
pub fn find_peaks(x: &[f64], options: &PeakOptions) -> Peaks {
    let candidates = local_maxima(x);
    if candidates.is_empty() {
        return Peaks::default();
    }

    let prom = peak_prominences(x, &candidates);
    let keep_prom: Vec<usize> = (0..candidates.len())
        .filter(|&k| options.prominence.map_or(true, |p| prom.prominences[k] >= p))
        .collect();

    let indices: Vec<usize> = keep_prom.iter().map(|&k| candidates[k]).collect();
    let prom = PeakProminences {
        prominences: keep_prom.iter().map(|&k| prom.prominences[k]).collect(),
        left_bases: keep_prom.iter().map(|&k| prom.left_bases[k]).collect(),
        right_bases: keep_prom.iter().map(|&k| prom.right_bases[k]).collect(),
    };
    let widths = peak_widths(x, &indices, &prom, options.rel_height);

    let mut peaks = Peaks::default();
    for k in 0..indices.len() {
        if options.width.is_some_and(|w| widths.widths[k] < w) {
            continue;
        }
        peaks.indices.push(indices[k]);
        peaks.prominences.push(prom.prominences[k]);
        peaks.widths.push(widths.widths[k]);
    }
    peaks
}
