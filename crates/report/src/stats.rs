use serde::{Deserialize, Serialize};

/// Distribution of commit latencies (ms) across completed txs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub std_dev: f64,
    pub p50: i64,
    pub p90: i64,
    pub p99: i64,
}

impl LatencyStats {
    pub fn from_latencies(latencies: &[i64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }
        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();
        let mean = mean(&sorted);
        Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            std_dev: std_deviation(&sorted, mean),
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p99: percentile(&sorted, 0.99),
        }
    }
}

fn mean(data: &[i64]) -> f64 {
    data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
pub fn std_deviation(data: &[i64], mean: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let variance = data
        .iter()
        .map(|&v| {
            let diff = v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;
    variance.sqrt()
}

/// Nearest-rank percentile over sorted data.
fn percentile(sorted: &[i64], q: f64) -> i64 {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_latencies_are_all_zero() {
        assert_eq!(LatencyStats::from_latencies(&[]), LatencyStats::default());
    }

    #[test]
    fn computes_distribution() {
        let latencies: Vec<i64> = (1..=100).rev().collect();
        let stats = LatencyStats::from_latencies(&latencies);
        assert_eq!(stats.min, 1);
        assert_eq!(stats.max, 100);
        assert_eq!(stats.mean, 50.5);
        assert_eq!(stats.p50, 50);
        assert_eq!(stats.p90, 90);
        assert_eq!(stats.p99, 99);
    }

    #[test]
    fn std_deviation_of_constant_data_is_zero() {
        assert_eq!(std_deviation(&[450, 450, 450], 450.0), 0.0);
        let sd = std_deviation(&[2, 4, 4, 4, 5, 5, 7, 9], 5.0);
        assert!((sd - 2.0).abs() < 1e-9);
    }
}
