use serde::{Deserialize, Serialize};

use crate::aggregate::LatencyRecord;

/// One-second histogram of send-to-commit latency.
pub struct TimeToCommitChart {
    /// Each tx's latency in milliseconds, clamped at zero.
    latencies_ms: Vec<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TimeToCommitData {
    pub buckets: Vec<String>,
    pub counts: Vec<u64>,
    pub max_count: u64,
}

impl TimeToCommitChart {
    pub fn new(records: &[LatencyRecord]) -> Self {
        let latencies_ms = records.iter().map(|r| r.latency.max(0) as u64).collect();
        Self { latencies_ms }
    }

    pub fn data(&self) -> TimeToCommitData {
        let mut counts: Vec<u64> = vec![];
        for &latency_ms in &self.latencies_ms {
            let bucket_index = (latency_ms / 1000) as usize;
            if bucket_index >= counts.len() {
                counts.resize(bucket_index + 1, 0);
            }
            counts[bucket_index] += 1;
        }

        let (buckets, counts): (Vec<String>, Vec<u64>) = counts
            .into_iter()
            .enumerate()
            .filter(|(_, count)| *count > 0)
            .map(|(i, count)| (format!("{} - {} s", i, i + 1), count))
            .unzip();
        let max_count = counts.iter().copied().max().unwrap_or_default();

        TimeToCommitData {
            buckets,
            counts,
            max_count,
        }
    }
}
