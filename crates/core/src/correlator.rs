use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    endpoint::EndpointPool,
    error::ConfigErrorKind,
    types::{InclusionRecord, SendRecord, TxId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorrelatorConfig {
    /// Lookup rounds before unresolved txs are given up on.
    pub max_rounds: usize,
    /// Pause between rounds.
    pub backoff: Duration,
    /// Lookups in flight at once within a round.
    pub concurrency: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            backoff: Duration::from_secs(5),
            concurrency: 64,
        }
    }
}

impl CorrelatorConfig {
    /// Round budget scaled to the size of the run: `ceil(num_txs / 50 * 1.5)`, at least 1.
    pub fn rounds_for(num_txs: usize) -> usize {
        ((num_txs as f64 / 50.0 * 1.5).ceil() as usize).max(1)
    }
}

#[derive(Debug, Default)]
pub struct Correlation {
    pub included: Vec<InclusionRecord>,
    /// Txs no lookup found within the round budget.
    pub unresolved: Vec<TxId>,
    pub rounds: usize,
}

/// Polls an endpoint for the inclusion height of each submitted tx, in sequential rounds
/// with a fixed backoff between them.
pub struct BlockCorrelator<C> {
    pool: Arc<EndpointPool>,
    clock: Arc<C>,
    config: CorrelatorConfig,
}

impl<C: Clock> BlockCorrelator<C> {
    pub fn new(
        pool: Arc<EndpointPool>,
        clock: Arc<C>,
        config: CorrelatorConfig,
    ) -> Result<Self, ConfigErrorKind> {
        if config.max_rounds == 0 {
            return Err(ConfigErrorKind::ZeroRounds);
        }
        Ok(Self {
            pool,
            clock,
            config,
        })
    }

    pub async fn correlate(&self, records: &[SendRecord]) -> Correlation {
        let mut seen = HashSet::new();
        let mut unresolved: Vec<TxId> = records
            .iter()
            .map(|r| r.tx_id)
            .filter(|tx_id| seen.insert(*tx_id))
            .collect();
        let total = unresolved.len();
        let max_rounds = self.config.max_rounds;
        let mut correlation = Correlation::default();

        while correlation.rounds < max_rounds && !unresolved.is_empty() {
            correlation.rounds += 1;
            info!(
                "round {}/{max_rounds}: looking up {} tx(s)",
                correlation.rounds,
                unresolved.len()
            );

            let lookups = stream::iter(unresolved)
                .map(|tx_id| async move { (tx_id, self.pool.find(&tx_id).await) })
                .buffered(self.config.concurrency.max(1))
                .collect::<Vec<_>>()
                .await;

            unresolved = vec![];
            for (tx_id, lookup) in lookups {
                match lookup {
                    Ok(Some(height)) => correlation
                        .included
                        .push(InclusionRecord { tx_id, height }),
                    Ok(None) => unresolved.push(tx_id),
                    Err(e) => {
                        debug!("lookup for {tx_id} failed: {e}");
                        unresolved.push(tx_id);
                    }
                }
            }

            if unresolved.is_empty() {
                info!("all {total} tx(s) found in blocks");
                break;
            }
            info!(
                "found {}/{total} tx(s) in blocks",
                correlation.included.len()
            );
            if correlation.rounds < max_rounds {
                self.clock.sleep(self.config.backoff).await;
            }
        }

        for tx_id in &unresolved {
            warn!(
                "tx {tx_id} was not found in any block after {} round(s)",
                correlation.rounds
            );
        }
        correlation.unresolved = unresolved;
        correlation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        endpoint::LedgerRpc,
        metrics::RpcMetrics,
        mock::{MockClock, MockRpc},
    };

    fn send_record(payload: &[u8], sequence_index: usize) -> SendRecord {
        SendRecord {
            sequence_index,
            tx_id: MockRpc::tx_id(payload),
            send_time: 1000,
            endpoint: "node1".to_owned(),
        }
    }

    fn correlator(
        node: Arc<MockRpc>,
        clock: Arc<MockClock>,
        max_rounds: usize,
    ) -> BlockCorrelator<MockClock> {
        let pool = EndpointPool::new(
            vec![node as Arc<dyn LedgerRpc>],
            RpcMetrics::new().unwrap(),
        )
        .unwrap();
        BlockCorrelator::new(
            Arc::new(pool),
            clock,
            CorrelatorConfig {
                max_rounds,
                backoff: Duration::from_secs(5),
                concurrency: 4,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn retries_until_lagging_txs_are_visible() {
        let node = Arc::new(
            MockRpc::new("node1")
                .include(b"a", 7, 0)
                .include(b"b", 7, 1)
                .include(b"c", 8, 2),
        );
        let clock = Arc::new(MockClock::new(0));
        let records = vec![send_record(b"a", 0), send_record(b"b", 1), send_record(b"c", 2)];

        let correlation = correlator(node.clone(), clock.clone(), 5)
            .correlate(&records)
            .await;

        assert_eq!(correlation.rounds, 3);
        assert!(correlation.unresolved.is_empty());
        let mut heights: Vec<(TxId, u64)> = correlation
            .included
            .iter()
            .map(|r| (r.tx_id, r.height))
            .collect();
        heights.sort();
        let mut expected = vec![
            (MockRpc::tx_id(b"a"), 7),
            (MockRpc::tx_id(b"b"), 7),
            (MockRpc::tx_id(b"c"), 8),
        ];
        expected.sort();
        assert_eq!(heights, expected);
        // resolved txs are not looked up again: 3 + 2 + 1
        assert_eq!(node.find_calls(), 6);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[tokio::test]
    async fn gives_up_after_max_rounds() {
        let node = Arc::new(MockRpc::new("node1").include(b"a", 3, 0));
        let clock = Arc::new(MockClock::new(0));
        let records = vec![send_record(b"a", 0), send_record(b"ghost", 1)];

        let correlation = correlator(node.clone(), clock.clone(), 3)
            .correlate(&records)
            .await;

        assert_eq!(correlation.rounds, 3);
        assert_eq!(correlation.included.len(), 1);
        assert_eq!(correlation.unresolved, vec![MockRpc::tx_id(b"ghost")]);
        // no backoff after the final round
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn lookup_errors_count_as_unresolved() {
        let node = Arc::new(MockRpc::new("node1").unavailable_lookups());
        let records = vec![send_record(b"a", 0)];

        let correlation = correlator(node.clone(), Arc::new(MockClock::new(0)), 2)
            .correlate(&records)
            .await;

        assert!(correlation.included.is_empty());
        assert_eq!(correlation.unresolved.len(), 1);
        assert_eq!(node.find_calls(), 2);
    }

    #[tokio::test]
    async fn no_records_means_no_rounds() {
        let node = Arc::new(MockRpc::new("node1"));
        let correlation = correlator(node.clone(), Arc::new(MockClock::new(0)), 3)
            .correlate(&[])
            .await;
        assert_eq!(correlation.rounds, 0);
        assert_eq!(node.find_calls(), 0);
    }

    #[test]
    fn round_budget_scales_with_tx_count() {
        assert_eq!(CorrelatorConfig::rounds_for(0), 1);
        assert_eq!(CorrelatorConfig::rounds_for(10), 1);
        assert_eq!(CorrelatorConfig::rounds_for(100), 3);
        assert_eq!(CorrelatorConfig::rounds_for(1000), 30);
        assert_eq!(CorrelatorConfig::rounds_for(1001), 31);
    }
}
