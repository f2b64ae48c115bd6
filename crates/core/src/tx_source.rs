use std::{
    fs,
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};

use crate::{error::TxSourceError, types::TxRecord};

/// Ordered, finite set of pre-encoded transactions.
#[derive(Clone, Debug, Default)]
pub struct TxSource {
    txs: Vec<TxRecord>,
}

impl TxSource {
    /// Reads every file in `dir` in path order. Each file holds one base64-encoded transaction.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TxSourceError> {
        let dir = dir.as_ref();
        let read_dir = fs::read_dir(dir).map_err(|source| TxSourceError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = vec![];
        for entry in read_dir {
            let entry = entry.map_err(|source| TxSourceError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let payloads = paths
            .iter()
            .map(|path| read_encoded_tx(path))
            .collect::<Result<Vec<_>, _>>()?;
        if payloads.is_empty() {
            return Err(TxSourceError::Empty(dir.to_path_buf()));
        }

        info!("loaded {} transactions from {}", payloads.len(), dir.display());
        Ok(Self::from_payloads(payloads))
    }

    pub fn from_payloads(payloads: Vec<Vec<u8>>) -> Self {
        let txs = payloads
            .into_iter()
            .enumerate()
            .map(|(sequence_index, payload)| TxRecord {
                sequence_index,
                payload,
            })
            .collect();
        Self { txs }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn txs(&self) -> &[TxRecord] {
        &self.txs
    }
}

fn read_encoded_tx(path: &Path) -> Result<Vec<u8>, TxSourceError> {
    let content = fs::read_to_string(path).map_err(|source| TxSourceError::ReadFile {
        path: path.to_owned(),
        source,
    })?;
    debug!("decoding {}", path.display());
    STANDARD
        .decode(content.trim())
        .map_err(|source| TxSourceError::Decode {
            path: path.to_owned(),
            source,
        })
}
