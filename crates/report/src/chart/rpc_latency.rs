use cadence_core::{
    buckets::BucketsExt,
    metrics::{RpcMetrics, FIND_METHOD, SUBMIT_METHOD},
};
use serde::{Deserialize, Serialize};

/// Estimated RPC latency quantiles (ms) for one method.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RpcLatency {
    pub method: String,
    pub calls: u64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl RpcLatency {
    pub fn from_metrics(metrics: &RpcMetrics, method: &str) -> Self {
        let buckets = metrics.latency_buckets(method);
        Self {
            method: method.to_owned(),
            calls: buckets.total_count(),
            p50: buckets.estimate_quantile(0.5),
            p90: buckets.estimate_quantile(0.9),
            p99: buckets.estimate_quantile(0.99),
        }
    }
}

/// Quantiles for the submit and lookup calls made during a run.
pub fn rpc_latency_summary(metrics: &RpcMetrics) -> Vec<RpcLatency> {
    [SUBMIT_METHOD, FIND_METHOD]
        .into_iter()
        .map(|method| RpcLatency::from_metrics(metrics, method))
        .collect()
}
