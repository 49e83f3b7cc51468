//! Sample statistics for latency measurements
//!
//! Reduces an unordered set of round-trip samples (microseconds) to
//! min/max/mean, population standard deviation and interpolated percentiles.
//! The reduction sorts the caller's slice in place and allocates nothing.

use serde::{Deserialize, Serialize};

/// Descriptive statistics of a sample set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation (divides by n)
    pub stddev: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub count: usize,
}

impl SampleSummary {
    /// True when at least one sample was reduced
    pub fn is_success(&self) -> bool {
        self.count > 0
    }
}

/// Reduce `samples` to a [`SampleSummary`].
///
/// The slice is left sorted ascending. An empty slice yields an all-zero,
/// unsuccessful summary. NaN samples sort last and are not filtered.
pub fn reduce(samples: &mut [f64]) -> SampleSummary {
    if samples.is_empty() {
        return SampleSummary::default();
    }

    samples.sort_unstable_by(|a, b| a.total_cmp(b));

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&x| (x - mean).powi(2))
        .sum::<f64>()
        / n;

    SampleSummary {
        min: samples[0],
        max: samples[samples.len() - 1],
        mean,
        stddev: variance.sqrt(),
        p50: percentile(samples, 50.0),
        p90: percentile(samples, 90.0),
        p95: percentile(samples, 95.0),
        p99: percentile(samples, 99.0),
        p999: percentile(samples, 99.9),
        count: samples.len(),
    }
}

/// Percentile of an ascending slice by linear interpolation at `(p/100)*(n-1)`
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = (index.ceil() as usize).min(sorted_values.len() - 1);

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        // Rounding must not push the result past the bracketing sample
        (lower_value + weight * (upper_value - lower_value)).min(upper_value)
    }
}
