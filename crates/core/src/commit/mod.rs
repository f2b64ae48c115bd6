//! Wall-clock commit times per block height.
mod node_log;
mod resolver;

use async_trait::async_trait;

pub use node_log::{LogFormat, NodeLogSource};
pub use resolver::{CommitState, CommitTimeResolver};

use crate::{types::Height, Result};

/// External source of commit events.
#[async_trait]
pub trait CommitEventSource: Send + Sync {
    /// Looks up the commit time (epoch millis) of `height`. `Ok(None)` when no commit event
    /// for that height exists.
    async fn find_commit(&self, height: Height) -> Result<Option<i64>>;
}

#[async_trait]
impl<T: CommitEventSource + ?Sized> CommitEventSource for std::sync::Arc<T> {
    async fn find_commit(&self, height: Height) -> Result<Option<i64>> {
        (**self).find_commit(height).await
    }
}
