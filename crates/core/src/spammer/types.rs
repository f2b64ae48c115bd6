use std::io;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::spammer::tx_actor::TxActorMessage;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("failed to append to send log: {0}")]
    SendLog(#[from] csv::Error),

    #[error("failed to flush send log: {0}")]
    SendLogFlush(#[source] io::Error),

    #[error("failed to send mpsc message: {0}")]
    TxActorSendMessage(#[from] Box<mpsc::error::SendError<TxActorMessage>>),

    #[error("oneshot failed to send")]
    OneshotSend(()),

    #[error("oneshot receiver failed: {0}")]
    OneshotReceive(#[from] oneshot::error::RecvError),
}

pub type CallbackResult<T> = Result<T, CallbackError>;

/// Rate and duration ceiling for one broadcast stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpamConfig {
    /// Max dispatches started per one-second window.
    pub txs_per_second: usize,
    /// Max number of windows.
    pub duration_secs: usize,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            txs_per_second: 100,
            duration_secs: 60,
        }
    }
}
