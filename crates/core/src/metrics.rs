use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, Registry};

use crate::buckets::Bucket;

pub const SUBMIT_METHOD: &str = "broadcast_tx_sync";
pub const FIND_METHOD: &str = "tx";

const HISTOGRAM_NAME: &str = "rpc_latency_ms";
const LATENCY_BUCKETS_MS: [f64; 14] = [
    1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
    30_000.0,
];

/// RPC call latency, labelled by method and endpoint.
///
/// Each run owns its own registry so concurrent runs (and tests) don't mix samples.
#[derive(Clone)]
pub struct RpcMetrics {
    registry: Registry,
    histogram: HistogramVec,
}

impl RpcMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let histogram = HistogramVec::new(
            HistogramOpts::new(HISTOGRAM_NAME, "Latency of RPC calls in milliseconds")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(histogram.clone()))?;
        Ok(Self {
            registry,
            histogram,
        })
    }

    pub fn observe(&self, method: &str, endpoint: &str, elapsed: Duration) {
        self.histogram
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Cumulative buckets for `method`, summed over all endpoints. The last bucket is `+Inf`
    /// and holds every sample, including calls slower than the largest finite bound.
    pub fn latency_buckets(&self, method: &str) -> Vec<Bucket> {
        let mut buckets: Vec<Bucket> = LATENCY_BUCKETS_MS
            .iter()
            .map(|&upper_bound| Bucket::from((upper_bound, 0)))
            .collect();
        let mut sample_count = 0;

        for family in self.registry.gather() {
            if family.get_name() != HISTOGRAM_NAME {
                continue;
            }
            for metric in family.get_metric() {
                let matches_method = metric
                    .get_label()
                    .iter()
                    .any(|l| l.get_name() == "method" && l.get_value() == method);
                if !matches_method {
                    continue;
                }
                let histogram = metric.get_histogram();
                for (acc, b) in buckets.iter_mut().zip(histogram.get_bucket()) {
                    acc.cumulative_count += b.get_cumulative_count();
                }
                sample_count += histogram.get_sample_count();
            }
        }
        buckets.push(Bucket::from((f64::INFINITY, sample_count)));
        buckets
    }
}
