//! Quantile estimation over cumulative histogram buckets, as exported by the RPC latency
//! histogram in [`crate::metrics`].

use serde::Serialize;

/// One histogram bucket: how many observations were `<= upper_bound` (in ms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

impl From<(f64, u64)> for Bucket {
    fn from((upper_bound, cumulative_count): (f64, u64)) -> Self {
        Self {
            upper_bound,
            cumulative_count,
        }
    }
}

pub trait BucketsExt {
    /// Linearly interpolates the value at `quantile` (0.0..=1.0). Returns 0 when no
    /// observations were recorded.
    fn estimate_quantile(&self, quantile: f64) -> f64;

    fn total_count(&self) -> u64;
}

impl BucketsExt for [Bucket] {
    fn estimate_quantile(&self, quantile: f64) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        let target = ((quantile.clamp(0.0, 1.0) * total as f64).ceil() as u64).max(1);

        let mut lower_bound = 0.0;
        let mut lower_count = 0;
        for bucket in self {
            if bucket.cumulative_count >= target {
                if bucket.upper_bound.is_infinite() {
                    return lower_bound;
                }
                let range = (bucket.cumulative_count - lower_count).max(1);
                let position = (target - lower_count) as f64 / range as f64;
                return lower_bound + (bucket.upper_bound - lower_bound) * position;
            }
            lower_bound = bucket.upper_bound;
            lower_count = bucket.cumulative_count;
        }

        // observations above the last finite bound
        lower_bound
    }

    fn total_count(&self) -> u64 {
        self.last().map(|b| b.cumulative_count).unwrap_or_default()
    }
}
