use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use cadence_core::{
    commit::LogFormat,
    correlator::CorrelatorConfig,
    endpoint::{normalize_url, DEFAULT_NODE_ADDRESSES},
    error::ConfigErrorKind,
    spammer::SpamConfig,
};
use clap::ValueEnum;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TX_DIR: &str = "node/txns/encoded";
pub const DEFAULT_COMMIT_LOG: &str = "node/node1/node1.log";
pub const DEFAULT_OUT_DIR: &str = "results";
pub const DEFAULT_TPS: usize = 100;
pub const DEFAULT_DURATION_SECS: usize = 60;
pub const DEFAULT_NODES: usize = 1;
pub const DEFAULT_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 64;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatCli {
    #[default]
    Json,
    Text,
}

impl From<LogFormatCli> for LogFormat {
    fn from(value: LogFormatCli) -> Self {
        match value {
            LogFormatCli::Json => LogFormat::Json,
            LogFormatCli::Text => LogFormat::Text,
        }
    }
}

/// One layer of run settings. The config file and the command-line flags each produce one;
/// flags are layered over the file and unset fields fall back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub tx_dir: Option<PathBuf>,
    pub tps: Option<usize>,
    pub duration: Option<usize>,
    pub nodes: Option<usize>,
    pub endpoints: Option<Vec<String>>,
    pub max_retries: Option<usize>,
    pub backoff_secs: Option<u64>,
    pub lookup_concurrency: Option<usize>,
    pub rpc_timeout_ms: Option<u64>,
    pub commit_log: Option<PathBuf>,
    pub log_format: Option<LogFormatCli>,
    pub out_dir: Option<PathBuf>,
}

impl ConfigLayer {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fields set in `self` win over those in `base`.
    pub fn layered_over(self, base: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            tx_dir: self.tx_dir.or(base.tx_dir),
            tps: self.tps.or(base.tps),
            duration: self.duration.or(base.duration),
            nodes: self.nodes.or(base.nodes),
            endpoints: self.endpoints.or(base.endpoints),
            max_retries: self.max_retries.or(base.max_retries),
            backoff_secs: self.backoff_secs.or(base.backoff_secs),
            lookup_concurrency: self.lookup_concurrency.or(base.lookup_concurrency),
            rpc_timeout_ms: self.rpc_timeout_ms.or(base.rpc_timeout_ms),
            commit_log: self.commit_log.or(base.commit_log),
            log_format: self.log_format.or(base.log_format),
            out_dir: self.out_dir.or(base.out_dir),
        }
    }

    pub fn resolve(self) -> Result<RunConfig, ConfigErrorKind> {
        let spam = SpamConfig {
            txs_per_second: self.tps.unwrap_or(DEFAULT_TPS),
            duration_secs: self.duration.unwrap_or(DEFAULT_DURATION_SECS),
        };
        if spam.txs_per_second == 0 {
            return Err(ConfigErrorKind::ZeroRate);
        }
        if self.max_retries == Some(0) {
            return Err(ConfigErrorKind::ZeroRounds);
        }

        Ok(RunConfig {
            tx_dir: self.tx_dir.unwrap_or_else(|| DEFAULT_TX_DIR.into()),
            spam,
            endpoints: select_endpoints(self.endpoints, self.nodes)?,
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms.unwrap_or(DEFAULT_RPC_TIMEOUT_MS)),
            max_rounds: self.max_retries,
            backoff: Duration::from_secs(self.backoff_secs.unwrap_or(DEFAULT_BACKOFF_SECS)),
            lookup_concurrency: self
                .lookup_concurrency
                .unwrap_or(DEFAULT_LOOKUP_CONCURRENCY)
                .max(1),
            commit_log: self
                .commit_log
                .unwrap_or_else(|| DEFAULT_COMMIT_LOG.into()),
            log_format: self.log_format.unwrap_or_default().into(),
            out_dir: self.out_dir.unwrap_or_else(|| DEFAULT_OUT_DIR.into()),
        })
    }
}

/// Picks the first `nodes` addresses. Without `--nodes`, an explicit endpoint list is used in
/// full and the built-in addresses are limited to one node.
fn select_endpoints(
    endpoints: Option<Vec<String>>,
    nodes: Option<usize>,
) -> Result<Vec<String>, ConfigErrorKind> {
    let explicit = endpoints.is_some();
    let available = endpoints.unwrap_or_else(|| {
        DEFAULT_NODE_ADDRESSES
            .iter()
            .map(|addr| addr.to_string())
            .collect()
    });
    let nodes = match nodes {
        Some(nodes) => nodes,
        None if explicit => available.len(),
        None => DEFAULT_NODES,
    };

    if nodes == 0 {
        return Err(ConfigErrorKind::NoEndpoints);
    }
    if nodes > available.len() {
        return Err(ConfigErrorKind::NotEnoughEndpoints {
            requested: nodes,
            available: available.len(),
        });
    }

    let selected = available.into_iter().take(nodes).collect::<Vec<_>>();
    for address in &selected {
        normalize_url(address)?;
    }
    Ok(selected)
}

/// Settings for one run, passed to each component's constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub tx_dir: PathBuf,
    pub spam: SpamConfig,
    pub endpoints: Vec<String>,
    pub rpc_timeout: Duration,
    /// Correlation rounds; scaled to the number of sends when unset.
    pub max_rounds: Option<usize>,
    pub backoff: Duration,
    pub lookup_concurrency: usize,
    pub commit_log: PathBuf,
    pub log_format: LogFormat,
    pub out_dir: PathBuf,
}

impl RunConfig {
    pub fn correlator_config(&self, num_sends: usize) -> CorrelatorConfig {
        CorrelatorConfig {
            max_rounds: self
                .max_rounds
                .unwrap_or_else(|| CorrelatorConfig::rounds_for(num_sends)),
            backoff: self.backoff,
            concurrency: self.lookup_concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConfigLayer::default().resolve().unwrap();
        assert_eq!(config.tx_dir, PathBuf::from(DEFAULT_TX_DIR));
        assert_eq!(config.spam, SpamConfig::default());
        assert_eq!(config.endpoints, vec![DEFAULT_NODE_ADDRESSES[0].to_owned()]);
        assert_eq!(config.rpc_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.out_dir, PathBuf::from("results"));
        assert_eq!(config.correlator_config(100).max_rounds, 3);
    }

    #[test]
    fn flags_override_file() {
        let file: ConfigLayer = toml::from_str(
            r#"
            tps = 250
            duration = 30
            endpoints = ["tcp://10.0.0.1:26657", "tcp://10.0.0.2:26657"]
            log_format = "text"
            "#,
        )
        .unwrap();
        let flags = ConfigLayer {
            tps: Some(50),
            nodes: Some(1),
            ..Default::default()
        };

        let config = flags.layered_over(file).resolve().unwrap();
        assert_eq!(config.spam.txs_per_second, 50);
        assert_eq!(config.spam.duration_secs, 30);
        assert_eq!(config.endpoints, vec!["tcp://10.0.0.1:26657".to_owned()]);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn explicit_endpoints_are_used_in_full() {
        let layer = ConfigLayer {
            endpoints: Some(vec!["localhost:1".to_owned(), "localhost:2".to_owned()]),
            ..Default::default()
        };
        assert_eq!(layer.resolve().unwrap().endpoints.len(), 2);
    }

    #[test]
    fn too_many_nodes_is_rejected() {
        let layer = ConfigLayer {
            nodes: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigErrorKind::NotEnoughEndpoints {
                requested: 5,
                available: 4
            })
        ));
    }

    #[test]
    fn zero_nodes_or_rate_is_rejected() {
        let zero_nodes = ConfigLayer {
            nodes: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            zero_nodes.resolve(),
            Err(ConfigErrorKind::NoEndpoints)
        ));

        let zero_rate = ConfigLayer {
            tps: Some(0),
            ..Default::default()
        };
        assert!(matches!(zero_rate.resolve(), Err(ConfigErrorKind::ZeroRate)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<ConfigLayer>("txs_per_second = 5").is_err());
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLayer::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
