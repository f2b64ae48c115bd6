use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::debug;

use super::CommitEventSource;
use crate::{error::CommitLogError, types::Height, Result};

static ANSI_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ansi regex"));
// The timestamp may follow a prefix such as `node1  | ` from docker compose.
static TEXT_COMMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(\d+)\s+.*committed state.*height=(\d+)").expect("valid commit regex")
});

const COMMITTED_STATE: &str = "committed";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (`--log_format json` on the node).
    #[default]
    Json,
    /// Console output prefixed with an epoch-millis timestamp.
    Text,
}

/// A line of a structured node log. Either carries `state` directly or the node's own
/// `module = "state"`, `message = "committed state"` pair.
#[derive(Debug, Deserialize)]
struct LogEvent {
    height: Option<Height>,
    time: Option<DateTime<Utc>>,
    state: Option<String>,
    module: Option<String>,
    message: Option<String>,
}

impl LogEvent {
    fn is_commit(&self) -> bool {
        self.state.as_deref() == Some(COMMITTED_STATE)
            || (self.module.as_deref() == Some("state")
                && self.message.as_deref() == Some("committed state"))
    }
}

fn parse_json_line(line: &str, height: Height) -> Option<i64> {
    let event: LogEvent = serde_json::from_str(line).ok()?;
    if event.height != Some(height) || !event.is_commit() {
        return None;
    }
    event.time.map(|t| t.timestamp_millis())
}

fn parse_text_line(line: &str, height: Height) -> Option<i64> {
    let line = ANSI_COLOR.replace_all(line, "");
    let caps = TEXT_COMMIT.captures(&line)?;
    let line_height: Height = caps[2].parse().ok()?;
    if line_height != height {
        return None;
    }
    caps[1].parse().ok()
}

/// Commit events read from a node's log file. Every lookup rescans the file.
#[derive(Clone, Debug)]
pub struct NodeLogSource {
    path: PathBuf,
    format: LogFormat,
}

impl NodeLogSource {
    /// Fails if the log cannot be opened, so a bad path is caught before the run starts.
    pub fn open(path: impl AsRef<Path>, format: LogFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::File::open(&path).map_err(|source| CommitLogError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommitEventSource for NodeLogSource {
    async fn find_commit(&self, height: Height) -> Result<Option<i64>> {
        let file = File::open(&self.path)
            .await
            .map_err(|source| CommitLogError::Open {
                path: self.path.clone(),
                source,
            })?;
        let mut lines = BufReader::new(file).lines();
        let parse = match self.format {
            LogFormat::Json => parse_json_line,
            LogFormat::Text => parse_text_line,
        };

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|source| CommitLogError::Read {
                path: self.path.clone(),
                source,
            })?
        {
            if let Some(commit_time) = parse(&line, height) {
                debug!("height {height} committed at {commit_time}");
                return Ok(Some(commit_time));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JSON_LOG: &str = r#"{"level":"info","module":"consensus","height":7,"time":"2024-11-05T09:00:00.900Z","message":"finalizing commit of block"}
not json at all
{"level":"info","module":"state","height":7,"time":"2024-11-05T09:00:01.500Z","message":"committed state"}
{"level":"info","module":"state","height":8,"time":"2024-11-05T09:00:02.250+00:00","message":"committed state"}
{"height":9,"state":"committed","time":"2024-11-05T09:00:03Z"}
"#;

    fn log_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn millis(rfc3339: &str) -> i64 {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .timestamp_millis()
    }

    #[tokio::test]
    async fn finds_committed_state_in_json_logs() {
        let file = log_file(JSON_LOG);
        let source = NodeLogSource::open(file.path(), LogFormat::Json).unwrap();
        assert_eq!(
            source.find_commit(7).await.unwrap(),
            Some(millis("2024-11-05T09:00:01.500Z"))
        );
        assert_eq!(
            source.find_commit(8).await.unwrap(),
            Some(millis("2024-11-05T09:00:02.250Z"))
        );
        assert_eq!(
            source.find_commit(9).await.unwrap(),
            Some(millis("2024-11-05T09:00:03Z"))
        );
        assert_eq!(source.find_commit(10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn finds_committed_state_in_colored_text_logs() {
        let file = log_file(concat!(
            "1730797200100 \x1b[32mINF\x1b[0m executed block height=41\n",
            "1730797200400 \x1b[32mINF\x1b[0m committed state \x1b[36mapp_hash=\x1b[0mAB \x1b[36mheight=\x1b[0m41\n",
            "1730797201400 INF committed state app_hash=CD height=42 module=state\n",
        ));
        let source = NodeLogSource::open(file.path(), LogFormat::Text).unwrap();
        assert_eq!(source.find_commit(41).await.unwrap(), Some(1730797200400));
        assert_eq!(source.find_commit(42).await.unwrap(), Some(1730797201400));
        assert_eq!(source.find_commit(4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn finds_committed_state_behind_a_line_prefix() {
        let file = log_file(concat!(
            "node1  | 1730797202400 INF committed state app_hash=EF height=43 module=state\n",
            "node12 | 1730797203400 \x1b[32mINF\x1b[0m committed state \x1b[36mheight=\x1b[0m44\n",
        ));
        let source = NodeLogSource::open(file.path(), LogFormat::Text).unwrap();
        assert_eq!(source.find_commit(43).await.unwrap(), Some(1730797202400));
        assert_eq!(source.find_commit(44).await.unwrap(), Some(1730797203400));
    }

    #[test]
    fn missing_log_fails_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeLogSource::open(dir.path().join("node1.log"), LogFormat::Json).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::CommitLog(CommitLogError::Open { .. })
        ));
    }
}
