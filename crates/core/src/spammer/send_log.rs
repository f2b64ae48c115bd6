use std::{fs::File, path::Path};

use csv::{ReaderBuilder, Writer, WriterBuilder};

use super::types::CallbackResult;
use crate::{types::SendRecord, Result};

/// File name of the send log inside a run's output directory.
pub const SEND_LOG_FILE: &str = "tx_log.csv";

const HEADER: [&str; 4] = ["sequence_index", "tx_id", "send_time", "endpoint"];

/// Append-only CSV audit log with one row per accepted transaction.
pub struct SendLog {
    writer: Writer<File>,
}

impl SendLog {
    /// Creates (or truncates) the log and writes its header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &SendRecord) -> CallbackResult<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> CallbackResult<()> {
        self.writer
            .flush()
            .map_err(super::types::CallbackError::SendLogFlush)
    }

    /// Reads back a log written by [`SendLog`].
    pub fn read(path: impl AsRef<Path>) -> Result<Vec<SendRecord>> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
        let records = reader
            .deserialize::<SendRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
