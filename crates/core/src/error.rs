use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{endpoint::RpcError, spammer::CallbackError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("critical error from send-record actor")]
    Callback(#[from] CallbackError),

    #[error("commit log error")]
    CommitLog(#[from] CommitLogError),

    #[error("invalid configuration")]
    Config(#[from] ConfigErrorKind),

    #[error("io error")]
    Io(#[from] io::Error),

    #[error("failed to initialize rpc metrics")]
    Metrics(#[from] prometheus::Error),

    #[error("rpc error")]
    Rpc(#[from] RpcError),

    #[error("send log error")]
    SendLog(#[from] csv::Error),

    #[error("spam task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("failed to read transaction source")]
    TxSource(#[from] TxSourceError),
}

/// Configuration problems that make a run impossible to start.
#[derive(Debug, Error)]
pub enum ConfigErrorKind {
    #[error("endpoint pool is empty; at least one endpoint is required")]
    NoEndpoints,

    #[error("requested {requested} endpoint(s) but only {available} address(es) are configured")]
    NotEnoughEndpoints { requested: usize, available: usize },

    #[error("invalid endpoint address '{0}'")]
    InvalidEndpoint(String),

    #[error("target rate must be at least 1 tx/sec")]
    ZeroRate,

    #[error("correlation needs at least one round")]
    ZeroRounds,
}

#[derive(Debug, Error)]
pub enum TxSourceError {
    #[error("failed to read transaction directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("failed to read transaction file {path}: {source}")]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("transaction file {path} is not valid base64: {source}")]
    Decode {
        path: PathBuf,
        source: base64::DecodeError,
    },

    #[error("no transactions found in {0}")]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum CommitLogError {
    #[error("failed to open commit log {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read commit log {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}
