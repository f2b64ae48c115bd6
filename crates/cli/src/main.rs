mod commands;
mod config;
mod error;
mod util;

use commands::{CadenceCli, CadenceSubcommand};
use util::init_tracing;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = CadenceCli::parse_args();
    init_tracing();

    match args.command {
        CadenceSubcommand::Run { args } => commands::run(*args).await?,
        CadenceSubcommand::Report { args } => commands::report(*args).await?,
    }

    Ok(())
}
