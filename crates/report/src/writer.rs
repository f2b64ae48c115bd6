use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::{
    aggregate::{BlockTxCount, Report, RunSummary},
    chart::{rpc_latency::RpcLatency, time_to_commit::TimeToCommitData},
    error::Error,
    stats::LatencyStats,
    Result,
};

pub const TX_RESULTS_FILE: &str = "tx_results.json";
pub const LATENCY_CSV_FILE: &str = "latency.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Where [`write_report`] put each artifact.
#[derive(Clone, Debug)]
pub struct ReportPaths {
    pub tx_results: PathBuf,
    pub latency_csv: PathBuf,
    pub summary: PathBuf,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    summary: &'a RunSummary,
    latency_stats: &'a LatencyStats,
    block_tx_counts: &'a [BlockTxCount],
    time_to_commit: &'a TimeToCommitData,
    rpc_latency: &'a [RpcLatency],
}

/// Creates `out_dir` (and its parents) if missing.
pub fn ensure_dir(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).map_err(|e| Error::CreateDir(out_dir.to_path_buf(), e))
}

pub fn write_report(report: &Report, out_dir: &Path) -> Result<ReportPaths> {
    ensure_dir(out_dir)?;
    let paths = ReportPaths {
        tx_results: out_dir.join(TX_RESULTS_FILE),
        latency_csv: out_dir.join(LATENCY_CSV_FILE),
        summary: out_dir.join(SUMMARY_FILE),
    };

    write_tx_results(report, &paths.tx_results)?;
    write_latency_csv(report, &paths.latency_csv)?;

    let summary = SummaryFile {
        summary: &report.summary,
        latency_stats: &report.latency_stats,
        block_tx_counts: &report.block_tx_counts,
        time_to_commit: &report.time_to_commit,
        rpc_latency: &report.rpc_latency,
    };
    let mut writer = BufWriter::new(File::create(&paths.summary)?);
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!("report written to {}", out_dir.display());
    Ok(paths)
}

/// JSON lines: the run summary first, then one latency record per line.
fn write_tx_results(report: &Report, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &report.summary)?;
    writer.write_all(b"\n")?;
    for record in &report.records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_latency_csv(report: &Report, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for record in &report.records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use cadence_core::{
        mock::MockRpc,
        types::{InclusionRecord, SendRecord},
    };

    use super::*;
    use crate::aggregate::aggregate;

    fn sample_report() -> Report {
        let sends = [b"a".as_slice(), b"b".as_slice()]
            .iter()
            .enumerate()
            .map(|(i, payload)| SendRecord {
                sequence_index: i,
                tx_id: MockRpc::tx_id(payload),
                send_time: 1000 + 50 * i as i64,
                endpoint: "node1".to_owned(),
            })
            .collect::<Vec<_>>();
        let inclusions = sends
            .iter()
            .map(|s| InclusionRecord {
                tx_id: s.tx_id,
                height: 7,
            })
            .collect::<Vec<_>>();
        aggregate(2, &sends, &inclusions, &BTreeMap::from([(7, 1500)]))
    }

    #[test]
    fn writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("results");
        let report = sample_report();

        let paths = write_report(&report, &out_dir).unwrap();

        let tx_results = fs::read_to_string(&paths.tx_results).unwrap();
        let lines: Vec<&str> = tx_results.lines().collect();
        assert_eq!(lines.len(), 3);
        let summary: RunSummary = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(summary, report.summary);
        let first: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["block_height"], 7);
        assert_eq!(first["commit_timestamp"], 1500);
        assert_eq!(first["latency"], 500);
        assert_eq!(
            first["tx_hash"].as_str().unwrap(),
            MockRpc::tx_id(b"a").to_string()
        );

        let mut csv = csv::Reader::from_path(&paths.latency_csv).unwrap();
        let headers = csv.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![
                "tx_hash",
                "sequence_index",
                "send_timestamp",
                "commit_timestamp",
                "block_height",
                "latency"
            ]
        );
        assert_eq!(csv.records().count(), 2);

        let summary_file: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
        assert_eq!(summary_file["summary"]["total_succeeded"], 2);
        assert_eq!(summary_file["block_tx_counts"][0]["tx_count"], 2);
        // both txs land in the 0-1 s latency bucket
        assert_eq!(summary_file["time_to_commit"]["buckets"][0], "0 - 1 s");
        assert_eq!(summary_file["time_to_commit"]["counts"][0], 2);
    }

    #[test]
    fn empty_report_has_only_summary_line() {
        let dir = tempfile::tempdir().unwrap();
        let report = aggregate(3, &[], &[], &BTreeMap::new());
        let paths = write_report(&report, dir.path()).unwrap();
        let tx_results = fs::read_to_string(paths.tx_results).unwrap();
        assert_eq!(tx_results.lines().count(), 1);
    }

    #[test]
    fn unwritable_out_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();
        let err = ensure_dir(&file.join("results")).unwrap_err();
        assert!(matches!(err, Error::CreateDir(..)));
    }
}
