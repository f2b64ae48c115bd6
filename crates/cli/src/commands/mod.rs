mod cadence_subcommand;
pub mod common;
pub mod report;
pub mod run;

use clap::Parser;

pub use cadence_subcommand::CadenceSubcommand;
pub use report::report;
pub use run::run;

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version,
    about = "Rate-controlled broadcast and commit-latency measurement for CometBFT networks"
)]
pub struct CadenceCli {
    #[command(subcommand)]
    pub command: CadenceSubcommand,
}

impl CadenceCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
