use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use cadence_core::{
    clock::Clock,
    commit::{CommitEventSource, CommitTimeResolver},
    correlator::BlockCorrelator,
    endpoint::{CometRpc, EndpointPool, LedgerRpc},
    metrics::RpcMetrics,
    types::SendRecord,
};
use cadence_report::{aggregate, writer::ReportPaths, Report};
use clap::Args;
use tracing::info;

use crate::{
    config::{ConfigLayer, LogFormatCli, RunConfig},
    error::CadenceError,
    util::bold,
};

/// Flags shared by every command that talks to the nodes.
#[derive(Clone, Debug, Args)]
pub struct CommonCliArgs {
    /// TOML file with any of the run settings; flags take precedence.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Node addresses (`tcp://host:port`, `host:port` or http URLs).
    #[arg(
        long,
        num_args = 1..,
        value_delimiter = ',',
        value_name = "ADDR",
        long_help = "Node RPC addresses. Defaults to the four local testnet nodes on ports 26657, 26757, 26857 and 26957."
    )]
    pub endpoints: Option<Vec<String>>,

    /// Number of endpoints to use, taken from the front of the address list.
    #[arg(long, short = 'n', value_name = "N")]
    pub nodes: Option<usize>,

    /// Inclusion lookup rounds before a tx is given up on. [default: scaled to the tx count]
    #[arg(long, value_name = "ROUNDS")]
    pub max_retries: Option<usize>,

    /// Seconds to wait between lookup rounds. [default: 5]
    #[arg(long, value_name = "SECS")]
    pub backoff_secs: Option<u64>,

    /// Inclusion lookups in flight at once. [default: 64]
    #[arg(long, value_name = "N")]
    pub lookup_concurrency: Option<usize>,

    /// Per-call RPC timeout. [default: 10000]
    #[arg(long, value_name = "MS")]
    pub rpc_timeout_ms: Option<u64>,

    /// Node log with the block commit events. [default: node/node1/node1.log]
    #[arg(long, value_name = "FILE")]
    pub commit_log: Option<PathBuf>,

    /// Format of the commit log. [default: json]
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatCli>,

    /// Directory for the send log and report files. [default: results]
    #[arg(long, short = 'o', value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

impl CommonCliArgs {
    pub fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            nodes: self.nodes,
            endpoints: self.endpoints.clone(),
            max_retries: self.max_retries,
            backoff_secs: self.backoff_secs,
            lookup_concurrency: self.lookup_concurrency,
            rpc_timeout_ms: self.rpc_timeout_ms,
            commit_log: self.commit_log.clone(),
            log_format: self.log_format,
            out_dir: self.out_dir.clone(),
            ..Default::default()
        }
    }
}

/// Layers `flags` over the config file (if any) and resolves the result.
pub fn load_config(
    config_file: Option<&Path>,
    flags: ConfigLayer,
) -> Result<RunConfig, CadenceError> {
    let file = match config_file {
        Some(path) => {
            info!("loading config from {}", path.display());
            ConfigLayer::from_file(path)?
        }
        None => ConfigLayer::default(),
    };
    Ok(flags.layered_over(file).resolve()?)
}

pub fn build_pool(config: &RunConfig) -> Result<Arc<EndpointPool>, CadenceError> {
    let metrics = RpcMetrics::new().map_err(cadence_core::Error::from)?;
    let endpoints = config
        .endpoints
        .iter()
        .map(|address| {
            CometRpc::new(address, config.rpc_timeout).map(|rpc| Arc::new(rpc) as Arc<dyn LedgerRpc>)
        })
        .collect::<cadence_core::Result<Vec<_>>>()?;
    info!(
        "using {} endpoint(s): {}",
        endpoints.len(),
        config.endpoints.join(", ")
    );
    Ok(Arc::new(EndpointPool::new(endpoints, metrics)?))
}

/// Tx totals of a run, as opposed to the accepted sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxCounts {
    /// Txs in the source; sizes the default lookup round budget.
    pub loaded: usize,
    /// Txs dispatched to an endpoint, accepted or not.
    pub submitted: usize,
}

/// Finds the inclusion height of every send, resolves each height's commit time and
/// aggregates the result.
pub async fn correlate_and_report<C, S>(
    pool: Arc<EndpointPool>,
    clock: Arc<C>,
    commit_source: S,
    config: &RunConfig,
    counts: TxCounts,
    sends: &[SendRecord],
) -> Result<Report, CadenceError>
where
    C: Clock,
    S: CommitEventSource,
{
    let correlator_config = config.correlator_config(counts.loaded);
    info!(
        "looking up {} tx(s) in up to {} round(s)",
        sends.len(),
        correlator_config.max_rounds
    );
    let correlator = BlockCorrelator::new(pool.clone(), clock, correlator_config)?;
    let correlation = correlator.correlate(sends).await;
    info!(
        "found {} tx(s) in blocks after {} round(s), {} unresolved",
        correlation.included.len(),
        correlation.rounds,
        correlation.unresolved.len()
    );

    let heights = correlation
        .included
        .iter()
        .map(|inclusion| inclusion.height)
        .collect::<BTreeSet<_>>();
    let resolver = CommitTimeResolver::new(commit_source);
    let commit_times = resolver.resolve_all(heights).await;

    Ok(aggregate(counts.submitted, sends, &correlation.included, &commit_times)
        .with_rpc_latency(pool.metrics()))
}

pub fn log_summary(report: &Report, paths: &ReportPaths) {
    let summary = &report.summary;
    let stats = &report.latency_stats;
    info!(
        "{} of {} tx(s) committed, {} tps over {} ms",
        bold(summary.total_succeeded.to_string()),
        summary.total_submitted,
        bold(format!("{:.2}", summary.overall_tps)),
        summary.total_elapsed
    );
    if summary.total_succeeded > 0 {
        info!(
            "latency (ms): min {} / p50 {} / p90 {} / p99 {} / max {} (mean {:.1}, std dev {:.1})",
            stats.min, stats.p50, stats.p90, stats.p99, stats.max, stats.mean, stats.std_dev
        );
    }
    for rpc in &report.rpc_latency {
        info!(
            "{} ({} calls): p50 {:.1} ms, p90 {:.1} ms, p99 {:.1} ms",
            rpc.method, rpc.calls, rpc.p50, rpc.p90, rpc.p99
        );
    }
    info!("results written to {}", paths.tx_results.display());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadence_core::{
        mock::{MockClock, MockCommitSource, MockRpc},
        types::TxId,
    };

    use super::*;

    fn send(payload: &[u8], sequence_index: usize, send_time: i64) -> SendRecord {
        SendRecord {
            sequence_index,
            tx_id: MockRpc::tx_id(payload),
            send_time,
            endpoint: "node1".to_owned(),
        }
    }

    fn test_config() -> RunConfig {
        ConfigLayer {
            max_retries: Some(2),
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[tokio::test]
    async fn correlates_and_aggregates() {
        let rpc = MockRpc::new("node1")
            .include(b"a", 7, 0)
            .include(b"b", 7, 1)
            .include(b"c", 8, 0);
        let endpoints: Vec<Arc<dyn LedgerRpc>> = vec![Arc::new(rpc)];
        let pool = Arc::new(EndpointPool::new(endpoints, RpcMetrics::new().unwrap()).unwrap());
        let clock = Arc::new(MockClock::new(0));
        let commits = Arc::new(MockCommitSource::new([(7, 1500), (8, 2500)]));
        let sends = vec![
            send(b"a", 0, 1000),
            send(b"b", 1, 1050),
            send(b"c", 2, 2000),
            send(b"lost", 3, 2000),
        ];

        let report = correlate_and_report(
            pool,
            clock.clone(),
            commits.clone(),
            &test_config(),
            TxCounts {
                loaded: 5,
                submitted: 5,
            },
            &sends,
        )
        .await
        .unwrap();

        assert_eq!(report.summary.total_submitted, 5);
        assert_eq!(report.summary.total_succeeded, 3);
        let ids: Vec<TxId> = report.records.iter().map(|r| r.tx_id).collect();
        assert!(!ids.contains(&MockRpc::tx_id(b"lost")));
        assert_eq!(commits.lookups(7), 1);
        assert_eq!(commits.lookups(8), 1);
        // one backoff between the two rounds
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
        assert_eq!(report.rpc_latency.len(), 2);
    }

    #[test]
    fn common_flags_map_to_layer() {
        let args = CommonCliArgs {
            config: None,
            endpoints: Some(vec!["localhost:26657".to_owned()]),
            nodes: None,
            max_retries: Some(3),
            backoff_secs: None,
            lookup_concurrency: None,
            rpc_timeout_ms: Some(500),
            commit_log: None,
            log_format: Some(LogFormatCli::Text),
            out_dir: None,
        };
        let layer = args.to_layer();
        assert_eq!(layer.max_retries, Some(3));
        assert_eq!(layer.rpc_timeout_ms, Some(500));
        assert_eq!(layer.log_format, Some(LogFormatCli::Text));
        assert_eq!(layer.tps, None);
    }
}
