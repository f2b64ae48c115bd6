mod send_log;
pub mod timed;
pub mod tx_actor;
mod types;

pub use send_log::{SendLog, SEND_LOG_FILE};
pub use timed::{SpamOutcome, TimedSpammer};
pub use tx_actor::TxActorHandle;
pub use types::{CallbackError, CallbackResult, SpamConfig};
