use std::{io, path::PathBuf};

use cadence_core::error::ConfigErrorKind;
use miette::Diagnostic;
use thiserror::Error;

use crate::util::bold;

#[derive(Debug, Error, Diagnostic)]
pub enum CadenceError {
    #[error("invalid configuration")]
    #[diagnostic(help("check the --config file and the command-line flags"))]
    Config(#[from] ConfigError),

    #[error("core error")]
    Core(#[from] cadence_core::Error),

    #[error("report error")]
    Report(#[from] cadence_report::Error),
}

impl From<ConfigErrorKind> for CadenceError {
    fn from(kind: ConfigErrorKind) -> Self {
        Self::Config(kind.into())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigErrorKind),

    #[error("send log {} does not exist; pass {} or run {} first", .0.display(), bold("--send-log"), bold("cadence run"))]
    SendLogMissing(PathBuf),
}
