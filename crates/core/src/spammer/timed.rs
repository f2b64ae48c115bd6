use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{tx_actor::TxActorHandle, types::CallbackResult, SpamConfig};
use crate::{
    clock::Clock,
    endpoint::EndpointPool,
    error::ConfigErrorKind,
    tx_source::TxSource,
    types::{SendRecord, TxRecord},
    Result,
};

const WINDOW: Duration = Duration::from_secs(1);

/// Result of a broadcast stage.
#[derive(Debug, Default)]
pub struct SpamOutcome {
    /// One per accepted tx, in no particular order.
    pub records: Vec<SendRecord>,
    /// Dispatches started in each window that ran.
    pub window_counts: Vec<usize>,
    /// Txs dispatched, accepted or not.
    pub attempted: usize,
}

/// Window-paced broadcaster: at most `txs_per_second` dispatches per one-second window, for
/// at most `duration_secs` windows.
///
/// A window's dispatches run concurrently and are joined before the next window. If a window
/// takes longer than a second the next one starts immediately, so slow endpoints lower the
/// achieved rate rather than causing a burst.
pub struct TimedSpammer<C> {
    pool: Arc<EndpointPool>,
    clock: Arc<C>,
    config: SpamConfig,
    cancel_token: CancellationToken,
}

impl<C> TimedSpammer<C>
where
    C: Clock + 'static,
{
    pub fn new(
        pool: Arc<EndpointPool>,
        clock: Arc<C>,
        config: SpamConfig,
    ) -> std::result::Result<Self, ConfigErrorKind> {
        if config.txs_per_second == 0 {
            return Err(ConfigErrorKind::ZeroRate);
        }
        Ok(Self {
            pool,
            clock,
            config,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Stops the stage before the next window once `cancel_token` fires.
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub async fn spam(&self, source: &TxSource, tx_actor: &TxActorHandle) -> Result<SpamOutcome> {
        let txs = source.txs();
        let SpamConfig {
            txs_per_second,
            duration_secs,
        } = self.config;
        info!(
            "broadcasting {} txs at {txs_per_second} tx/s for at most {duration_secs}s across {} endpoint(s)",
            txs.len(),
            self.pool.len()
        );

        let mut outcome = SpamOutcome::default();
        let mut cursor = 0;
        for window in 0..duration_secs {
            if cursor >= txs.len() {
                break;
            }
            if self.cancel_token.is_cancelled() {
                warn!("broadcast cancelled after {window} window(s)");
                break;
            }

            let window_start = self.clock.now_millis();
            let batch = &txs[cursor..(cursor + txs_per_second).min(txs.len())];
            let tasks = batch
                .iter()
                .cloned()
                .map(|tx| {
                    let pool = self.pool.clone();
                    let clock = self.clock.clone();
                    let tx_actor = tx_actor.clone();
                    tokio::task::spawn(async move { send_tx(&pool, clock.as_ref(), &tx_actor, tx).await })
                })
                .collect::<Vec<_>>();
            for task in join_all(tasks).await {
                task??;
            }

            cursor += batch.len();
            outcome.window_counts.push(batch.len());
            let elapsed = (self.clock.now_millis() - window_start).max(0) as u64;
            info!(
                "window {}/{duration_secs}: dispatched {} txs in {elapsed}ms ({cursor}/{} total)",
                window + 1,
                batch.len(),
                txs.len()
            );

            // the last window is paced too
            let remaining = WINDOW.saturating_sub(Duration::from_millis(elapsed));
            if !remaining.is_zero() && !self.cancel_token.is_cancelled() {
                debug!("sleeping {}ms until window end", remaining.as_millis());
                self.clock.sleep(remaining).await;
            }
        }

        outcome.attempted = cursor;
        outcome.records = tx_actor.dump_cache().await?;
        if cursor < txs.len() {
            info!(
                "duration ceiling reached; {} txs were never sent",
                txs.len() - cursor
            );
        }
        info!(
            "broadcast finished: {}/{} txs accepted",
            outcome.records.len(),
            outcome.attempted
        );
        Ok(outcome)
    }
}

/// Submits one tx. Rejections are logged and dropped; only send-log failures are errors.
async fn send_tx<C: Clock>(
    pool: &EndpointPool,
    clock: &C,
    tx_actor: &TxActorHandle,
    tx: TxRecord,
) -> CallbackResult<()> {
    let endpoint = pool.select(tx.sequence_index).name().to_owned();
    match pool.submit(tx.sequence_index, &tx.payload).await {
        Ok(tx_id) => {
            // stamped after the node acknowledged the tx
            let send_time = clock.now_millis();
            tx_actor
                .cache_send_record(SendRecord {
                    sequence_index: tx.sequence_index,
                    tx_id,
                    send_time,
                    endpoint,
                })
                .await
        }
        Err(e) => {
            warn!(
                "[tx {}] failed to broadcast to {endpoint}: {e}",
                tx.sequence_index
            );
            Ok(())
        }
    }
}
