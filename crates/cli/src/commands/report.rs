use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use cadence_core::{
    clock::{Clock, SystemClock},
    commit::{CommitEventSource, NodeLogSource},
    endpoint::EndpointPool,
    spammer::{SendLog, SEND_LOG_FILE},
};
use cadence_report::{
    writer::{write_report, ReportPaths},
    Report,
};
use clap::Args;
use tracing::info;

use super::common::{
    build_pool, correlate_and_report, load_config, log_summary, CommonCliArgs, TxCounts,
};
use crate::{
    config::RunConfig,
    error::{CadenceError, ConfigError},
};

#[derive(Clone, Debug, Args)]
pub struct ReportCliArgs {
    #[command(flatten)]
    pub common: CommonCliArgs,

    /// Send log of an earlier run. [default: <out-dir>/tx_log.csv]
    #[arg(long, value_name = "FILE")]
    pub send_log: Option<PathBuf>,
}

pub async fn report(args: ReportCliArgs) -> Result<(), CadenceError> {
    let config = load_config(args.common.config.as_deref(), args.common.to_layer())?;
    let send_log = args
        .send_log
        .unwrap_or_else(|| config.out_dir.join(SEND_LOG_FILE));
    if !send_log.is_file() {
        return Err(ConfigError::SendLogMissing(send_log).into());
    }

    let commit_source = NodeLogSource::open(&config.commit_log, config.log_format)?;
    let pool = build_pool(&config)?;
    let (report, paths) =
        recorrelate(pool, Arc::new(SystemClock), commit_source, &config, &send_log).await?;
    log_summary(&report, &paths);
    Ok(())
}

/// Rebuilds the report of a finished run from its send log. Every row counts as submitted.
pub async fn recorrelate<C, S>(
    pool: Arc<EndpointPool>,
    clock: Arc<C>,
    commit_source: S,
    config: &RunConfig,
    send_log: &Path,
) -> Result<(Report, ReportPaths), CadenceError>
where
    C: Clock,
    S: CommitEventSource,
{
    let sends = SendLog::read(send_log)?;
    info!("read {} send record(s) from {}", sends.len(), send_log.display());

    // the tx source is not read here, so each logged send counts as loaded
    let counts = TxCounts {
        loaded: sends.len(),
        submitted: sends.len(),
    };
    let report = correlate_and_report(pool, clock, commit_source, config, counts, &sends).await?;
    let paths = write_report(&report, &config.out_dir)?;
    Ok((report, paths))
}

#[cfg(test)]
mod tests {
    use cadence_core::{
        endpoint::LedgerRpc,
        metrics::RpcMetrics,
        mock::{MockClock, MockCommitSource, MockRpc},
        types::SendRecord,
    };

    use super::*;
    use crate::config::ConfigLayer;

    #[tokio::test]
    async fn rebuilds_report_from_send_log() {
        let dir = tempfile::tempdir().unwrap();
        let send_log_path = dir.path().join(SEND_LOG_FILE);
        let mut send_log = SendLog::create(&send_log_path).unwrap();
        for (i, payload) in [b"x".as_slice(), b"y".as_slice()].into_iter().enumerate() {
            send_log
                .append(&SendRecord {
                    sequence_index: i,
                    tx_id: MockRpc::tx_id(payload),
                    send_time: 1_000 + i as i64,
                    endpoint: "node1".to_owned(),
                })
                .unwrap();
        }
        send_log.flush().unwrap();

        let config = ConfigLayer {
            max_retries: Some(1),
            out_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        let endpoints: Vec<Arc<dyn LedgerRpc>> =
            vec![Arc::new(MockRpc::new("node1").include(b"x", 12, 0))];
        let pool = Arc::new(EndpointPool::new(endpoints, RpcMetrics::new().unwrap()).unwrap());

        let (report, paths) = recorrelate(
            pool,
            Arc::new(MockClock::new(0)),
            MockCommitSource::new([(12, 3_000)]),
            &config,
            &send_log_path,
        )
        .await
        .unwrap();

        assert_eq!(report.summary.total_submitted, 2);
        assert_eq!(report.summary.total_succeeded, 1);
        assert_eq!(report.records[0].latency, 2_000);
        assert_eq!(paths.tx_results, dir.path().join("tx_results.json"));
    }
}
