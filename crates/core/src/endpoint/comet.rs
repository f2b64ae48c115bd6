use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use jsonrpsee::{
    core::{client::ClientT, params::ObjectParams, ClientError},
    http_client::HttpClient,
};
use serde::Deserialize;
use url::Url;

use super::{LedgerRpc, RpcError};
use crate::{
    error::ConfigErrorKind,
    types::{Height, TxId},
};

pub const DEFAULT_NODE_ADDRESSES: [&str; 4] = [
    "tcp://localhost:26657",
    "tcp://localhost:26757",
    "tcp://localhost:26857",
    "tcp://localhost:26957",
];

/// Turns a node address (`tcp://host:port`, `host:port` or an http(s) URL) into an http URL.
pub fn normalize_url(address: &str) -> Result<Url, ConfigErrorKind> {
    let invalid = || ConfigErrorKind::InvalidEndpoint(address.to_owned());
    let with_scheme = match address.split_once("://") {
        Some(("tcp", rest)) => format!("http://{rest}"),
        Some(("http" | "https", _)) => address.to_owned(),
        Some(_) => return Err(invalid()),
        None => format!("http://{address}"),
    };
    let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
    if url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct BroadcastTxResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeightField {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    height: HeightField,
}

/// JSON-RPC client for a single CometBFT node.
pub struct CometRpc {
    name: String,
    client: HttpClient,
}

impl CometRpc {
    pub fn new(address: &str, request_timeout: Duration) -> crate::Result<Self> {
        let url = normalize_url(address)?;
        let client = HttpClient::builder()
            .request_timeout(request_timeout)
            .build(url.as_str())
            .map_err(RpcError::from)?;
        Ok(Self {
            name: address.to_owned(),
            client,
        })
    }

    fn malformed(&self, reason: impl ToString) -> RpcError {
        RpcError::MalformedResponse {
            endpoint: self.name.to_owned(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LedgerRpc for CometRpc {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, payload: &[u8]) -> Result<TxId, RpcError> {
        let mut params = ObjectParams::new();
        params
            .insert("tx", STANDARD.encode(payload))
            .map_err(ClientError::ParseError)?;
        let res: BroadcastTxResponse = self.client.request("broadcast_tx_sync", params).await?;
        if res.code != 0 {
            return Err(RpcError::Rejected {
                endpoint: self.name.to_owned(),
                code: res.code,
                log: res.log,
            });
        }
        res.hash.parse().map_err(|e| self.malformed(e))
    }

    async fn find(&self, tx_id: &TxId) -> Result<Option<Height>, RpcError> {
        let mut params = ObjectParams::new();
        params
            .insert("hash", STANDARD.encode(tx_id.as_bytes()))
            .map_err(ClientError::ParseError)?;
        params
            .insert("prove", false)
            .map_err(ClientError::ParseError)?;

        let res: Result<TxResponse, ClientError> = self.client.request("tx", params).await;
        match res {
            Ok(TxResponse {
                height: HeightField::Number(height),
            }) => Ok(Some(height)),
            Ok(TxResponse {
                height: HeightField::Text(height),
            }) => height.parse().map(Some).map_err(|e| self.malformed(e)),
            // the node answers unknown hashes with an rpc error rather than an empty result
            Err(ClientError::Call(err))
                if err.message().contains("not found")
                    || err.data().is_some_and(|d| d.get().contains("not found")) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
