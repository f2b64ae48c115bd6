pub mod buckets;
pub mod clock;
pub mod commit;
pub mod correlator;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod spammer;
pub mod tx_source;
pub mod types;
pub mod util;

pub use error::Error;

pub type Result<T> = std::result::Result<T, error::Error>;
