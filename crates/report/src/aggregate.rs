use std::collections::{BTreeMap, HashMap};

use cadence_core::{
    metrics::RpcMetrics,
    types::{Height, InclusionRecord, SendRecord, TxId},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    chart::{
        rpc_latency::{rpc_latency_summary, RpcLatency},
        time_to_commit::{TimeToCommitChart, TimeToCommitData},
    },
    stats::LatencyStats,
};

/// Send-to-commit latency of one tx that made it through every stage.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LatencyRecord {
    #[serde(rename = "tx_hash")]
    pub tx_id: TxId,
    pub sequence_index: usize,
    #[serde(rename = "send_timestamp")]
    pub send_time: i64,
    #[serde(rename = "commit_timestamp")]
    pub commit_time: i64,
    #[serde(rename = "block_height")]
    pub height: Height,
    pub latency: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RunSummary {
    pub total_submitted: usize,
    pub total_succeeded: usize,
    /// Completed txs per second, from the earliest send to the latest commit.
    pub overall_tps: f64,
    /// Milliseconds from the earliest send to the latest commit.
    pub total_elapsed: i64,
}

impl RunSummary {
    pub fn from_records(total_submitted: usize, records: &[LatencyRecord]) -> Self {
        let total_succeeded = records.len();
        let first_send = records.iter().map(|r| r.send_time).min();
        let last_commit = records.iter().map(|r| r.commit_time).max();
        let total_elapsed = match (first_send, last_commit) {
            (Some(first_send), Some(last_commit)) => last_commit - first_send,
            _ => 0,
        };
        let overall_tps = if total_succeeded == 0 || total_elapsed <= 0 {
            0.0
        } else {
            total_succeeded as f64 / (total_elapsed as f64 / 1000.0)
        };
        Self {
            total_submitted,
            total_succeeded,
            overall_tps,
            total_elapsed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockTxCount {
    pub height: Height,
    pub tx_count: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Report {
    pub summary: RunSummary,
    pub records: Vec<LatencyRecord>,
    pub latency_stats: LatencyStats,
    pub block_tx_counts: Vec<BlockTxCount>,
    pub time_to_commit: TimeToCommitData,
    #[serde(default)]
    pub rpc_latency: Vec<RpcLatency>,
}

impl Report {
    pub fn with_rpc_latency(mut self, metrics: &RpcMetrics) -> Self {
        self.rpc_latency = rpc_latency_summary(metrics);
        self
    }
}

/// Joins sends to inclusions on tx id, then inclusions to commit times on height.
///
/// Txs missing any leg are left out of the records but still count towards
/// `total_submitted`. Records are ordered by commit time, then send time.
pub fn aggregate(
    total_submitted: usize,
    sends: &[SendRecord],
    inclusions: &[InclusionRecord],
    commit_times: &BTreeMap<Height, i64>,
) -> Report {
    let mut heights: HashMap<TxId, Height> = HashMap::with_capacity(inclusions.len());
    for inclusion in inclusions {
        // the first inclusion found is final
        heights.entry(inclusion.tx_id).or_insert(inclusion.height);
    }

    let mut records = sends
        .iter()
        .filter_map(|send| {
            let height = *heights.get(&send.tx_id)?;
            let commit_time = *commit_times.get(&height)?;
            Some(LatencyRecord {
                tx_id: send.tx_id,
                sequence_index: send.sequence_index,
                send_time: send.send_time,
                commit_time,
                height,
                latency: commit_time - send.send_time,
            })
        })
        .collect::<Vec<_>>();
    records.sort_by_key(|r| (r.commit_time, r.send_time, r.sequence_index));

    let negative = records.iter().filter(|r| r.latency < 0).count();
    if negative > 0 {
        warn!(
            "{negative} tx(s) have a commit time earlier than their send time; node and harness clocks may be out of sync"
        );
    }

    let summary = RunSummary::from_records(total_submitted, &records);
    info!(
        "aggregated {}/{} tx(s): {:.2} tps over {}ms",
        summary.total_succeeded, summary.total_submitted, summary.overall_tps, summary.total_elapsed
    );

    let latencies = records.iter().map(|r| r.latency).collect::<Vec<_>>();
    let mut block_counts: BTreeMap<Height, usize> = BTreeMap::new();
    for record in &records {
        *block_counts.entry(record.height).or_default() += 1;
    }

    Report {
        summary,
        latency_stats: LatencyStats::from_latencies(&latencies),
        block_tx_counts: block_counts
            .into_iter()
            .map(|(height, tx_count)| BlockTxCount { height, tx_count })
            .collect(),
        time_to_commit: TimeToCommitChart::new(&records).data(),
        records,
        rpc_latency: vec![],
    }
}
