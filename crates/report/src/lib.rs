pub mod aggregate;
pub mod chart;
pub mod error;
pub mod stats;
pub mod writer;

pub use aggregate::{aggregate, BlockTxCount, LatencyRecord, Report, RunSummary};
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
