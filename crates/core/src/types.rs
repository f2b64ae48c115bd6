use std::{fmt, str::FromStr};

use alloy_primitives::{hex, B256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Sequence number of a block in the chain.
pub type Height = u64;

/// Identifier returned by an endpoint when it accepts a transaction.
///
/// Displayed as upper-case hex without a `0x` prefix, which is how the node reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(B256);

impl TxId {
    pub fn new(hash: B256) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<B256> for TxId {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl FromStr for TxId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim()).map(Self)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A pre-encoded transaction, as read from the transaction source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRecord {
    pub sequence_index: usize,
    pub payload: Vec<u8>,
}

/// A transaction accepted by an endpoint. `send_time` is epoch millis taken after the ack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRecord {
    pub sequence_index: usize,
    pub tx_id: TxId,
    pub send_time: i64,
    pub endpoint: String,
}

/// The block height a transaction was first found in. Never revised once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionRecord {
    pub tx_id: TxId,
    pub height: Height,
}
