use std::{future::Future, io, path::PathBuf, sync::Arc};

use cadence_core::{
    clock::{Clock, SystemClock},
    commit::{CommitEventSource, NodeLogSource},
    endpoint::EndpointPool,
    spammer::{SendLog, TimedSpammer, TxActorHandle, SEND_LOG_FILE},
    tx_source::TxSource,
};
use cadence_report::{
    writer::{ensure_dir, write_report, ReportPaths},
    Report,
};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{
    build_pool, correlate_and_report, load_config, log_summary, CommonCliArgs, TxCounts,
};
use crate::{
    config::{ConfigLayer, RunConfig},
    error::CadenceError,
};

const TX_ACTOR_BUFSIZE: usize = 1024;

#[derive(Clone, Debug, Args)]
pub struct RunCliArgs {
    #[command(flatten)]
    pub common: CommonCliArgs,

    /// Directory of base64-encoded signed txs, sent in file-name order. [default: node/txns/encoded]
    #[arg(long, value_name = "DIR")]
    pub tx_dir: Option<PathBuf>,

    /// Txs sent per second. [default: 100]
    #[arg(long = "tps", visible_alias = "txs-per-second", value_name = "N")]
    pub txs_per_second: Option<usize>,

    /// Max seconds of sending. [default: 60]
    #[arg(long, short = 'd', value_name = "SECS")]
    pub duration: Option<usize>,
}

impl RunCliArgs {
    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            tx_dir: self.tx_dir.clone(),
            tps: self.txs_per_second,
            duration: self.duration,
            ..self.common.to_layer()
        }
    }
}

pub async fn run(args: RunCliArgs) -> Result<(), CadenceError> {
    let config = load_config(args.common.config.as_deref(), args.to_layer())?;

    // everything that can fail on bad input is checked before the first file is written
    let source = TxSource::from_dir(&config.tx_dir).map_err(cadence_core::Error::from)?;
    info!(
        "loaded {} tx(s) from {}",
        source.len(),
        config.tx_dir.display()
    );
    let commit_source = NodeLogSource::open(&config.commit_log, config.log_format)?;
    let pool = build_pool(&config)?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::task::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, ctrl_c_token).await {
            std::process::exit(130);
        }
    });

    let (report, paths) = spam_and_report(
        pool,
        Arc::new(SystemClock),
        commit_source,
        &source,
        &config,
        cancel_token,
    )
    .await?;
    log_summary(&report, &paths);
    Ok(())
}

/// Cancels `token` on the first interrupt. Returns `true` once a second interrupt arrives,
/// `false` if the listener fails first.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, token: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    info!("CTRL-C received, sending stops after the current window. Press CTRL-C again to exit now.");
    token.cancel();
    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("second CTRL-C received, exiting without a report");
    true
}

/// Broadcasts `source`, then correlates, aggregates and writes the report to `config.out_dir`.
pub async fn spam_and_report<C, S>(
    pool: Arc<EndpointPool>,
    clock: Arc<C>,
    commit_source: S,
    source: &TxSource,
    config: &RunConfig,
    cancel_token: CancellationToken,
) -> Result<(Report, ReportPaths), CadenceError>
where
    C: Clock + 'static,
    S: CommitEventSource,
{
    let spammer =
        TimedSpammer::new(pool.clone(), clock.clone(), config.spam)?.with_cancel_token(cancel_token);

    ensure_dir(&config.out_dir)?;
    let send_log_path = config.out_dir.join(SEND_LOG_FILE);
    let send_log = SendLog::create(&send_log_path)?;
    let tx_actor = TxActorHandle::new(TX_ACTOR_BUFSIZE, Some(send_log));

    let outcome = spammer.spam(source, &tx_actor).await?;
    info!("send log written to {}", send_log_path.display());

    let report = correlate_and_report(
        pool,
        clock,
        commit_source,
        config,
        TxCounts {
            loaded: source.len(),
            submitted: outcome.attempted,
        },
        &outcome.records,
    )
    .await?;
    let paths = write_report(&report, &config.out_dir)?;
    Ok((report, paths))
}
