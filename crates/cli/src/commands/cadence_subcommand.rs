use clap::Subcommand;

use super::{report::ReportCliArgs, run::RunCliArgs};

#[derive(Debug, Subcommand)]
pub enum CadenceSubcommand {
    #[command(
        name = "run",
        long_about = "Broadcast the encoded txs at a fixed rate, find the block that included each one, and report send-to-commit latency."
    )]
    Run {
        #[command(flatten)]
        args: Box<RunCliArgs>,
    },

    #[command(
        name = "report",
        long_about = "Re-correlate the send log of an earlier run against the nodes and commit log, and rewrite its report."
    )]
    Report {
        #[command(flatten)]
        args: Box<ReportCliArgs>,
    },
}
