mod comet;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

pub use comet::{normalize_url, CometRpc, DEFAULT_NODE_ADDRESSES};

use crate::{
    error::ConfigErrorKind,
    metrics::{RpcMetrics, FIND_METHOD, SUBMIT_METHOD},
    types::{Height, TxId},
};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("json-rpc client error: {0}")]
    Client(#[from] jsonrpsee::core::ClientError),

    #[error("tx rejected by {endpoint} (code {code}): {log}")]
    Rejected {
        endpoint: String,
        code: u32,
        log: String,
    },

    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("endpoint {0} is unavailable")]
    Unavailable(String),
}

/// A node that accepts transactions and answers inclusion lookups.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    fn name(&self) -> &str;

    /// Submits an encoded transaction; returns its identifier once the node acknowledges it.
    async fn submit(&self, payload: &[u8]) -> Result<TxId, RpcError>;

    /// Returns the height of the block containing `tx_id`, or `None` if the node doesn't know it yet.
    async fn find(&self, tx_id: &TxId) -> Result<Option<Height>, RpcError>;
}

/// Fixed set of endpoints shared by the broadcaster and the correlator.
#[derive(Clone)]
pub struct EndpointPool {
    endpoints: Vec<Arc<dyn LedgerRpc>>,
    metrics: RpcMetrics,
}

impl EndpointPool {
    pub fn new(
        endpoints: Vec<Arc<dyn LedgerRpc>>,
        metrics: RpcMetrics,
    ) -> Result<Self, ConfigErrorKind> {
        if endpoints.is_empty() {
            return Err(ConfigErrorKind::NoEndpoints);
        }
        Ok(Self { endpoints, metrics })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint assigned to a transaction: `sequence_index mod len`.
    pub fn select(&self, sequence_index: usize) -> &Arc<dyn LedgerRpc> {
        &self.endpoints[sequence_index % self.endpoints.len()]
    }

    /// Endpoint used for lookups. Committed txs are visible from any node.
    pub fn primary(&self) -> &Arc<dyn LedgerRpc> {
        &self.endpoints[0]
    }

    pub fn metrics(&self) -> &RpcMetrics {
        &self.metrics
    }

    /// Submits `payload` to the endpoint selected for `sequence_index`.
    pub async fn submit(&self, sequence_index: usize, payload: &[u8]) -> Result<TxId, RpcError> {
        let endpoint = self.select(sequence_index);
        let start = Instant::now();
        let res = endpoint.submit(payload).await;
        self.metrics
            .observe(SUBMIT_METHOD, endpoint.name(), start.elapsed());
        res
    }

    pub async fn find(&self, tx_id: &TxId) -> Result<Option<Height>, RpcError> {
        let endpoint = self.primary();
        let start = Instant::now();
        let res = endpoint.find(tx_id).await;
        self.metrics.observe(FIND_METHOD, endpoint.name(), start.elapsed());
        debug!("lookup {tx_id} on {}: {res:?}", endpoint.name());
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buckets::BucketsExt, mock::MockRpc};

    fn pool(names: &[&str]) -> EndpointPool {
        let endpoints = names
            .iter()
            .map(|n| Arc::new(MockRpc::new(n)) as Arc<dyn LedgerRpc>)
            .collect();
        EndpointPool::new(endpoints, RpcMetrics::new().unwrap()).unwrap()
    }

    #[test]
    fn empty_pool_is_rejected() {
        let res = EndpointPool::new(vec![], RpcMetrics::new().unwrap());
        assert!(matches!(res, Err(ConfigErrorKind::NoEndpoints)));
    }

    #[test]
    fn selects_by_sequence_index_modulo() {
        let pool = pool(&["a", "b", "c"]);
        let picked: Vec<&str> = (0..7).map(|i| pool.select(i).name()).collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c", "a"]);
        assert_eq!(pool.primary().name(), "a");
    }

    #[tokio::test]
    async fn calls_are_recorded_in_metrics() {
        let pool = pool(&["a", "b"]);
        pool.submit(0, b"one").await.unwrap();
        pool.submit(1, b"two").await.unwrap();
        pool.find(&MockRpc::tx_id(b"one")).await.unwrap();
        assert_eq!(pool.metrics().latency_buckets(SUBMIT_METHOD).total_count(), 2);
        assert_eq!(pool.metrics().latency_buckets(FIND_METHOD).total_count(), 1);
    }
}
