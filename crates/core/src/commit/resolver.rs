use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use futures::{stream, StreamExt};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use super::CommitEventSource;
use crate::{types::Height, util::error_chain};

const DEFAULT_CONCURRENCY: usize = 16;

/// Settled state of a height. A height with no entry has not been asked for yet; an
/// entry whose cell is still empty has a lookup in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitState {
    Resolved(i64),
    Failed(String),
}

/// Memoizes commit times per height. At most one external lookup is made per height for the
/// lifetime of the resolver; concurrent callers for the same height wait on that lookup.
/// Failures are cached too and never retried.
pub struct CommitTimeResolver<S> {
    source: S,
    entries: RwLock<HashMap<Height, Arc<OnceCell<CommitState>>>>,
    concurrency: usize,
}

impl<S: CommitEventSource> CommitTimeResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: RwLock::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Max heights looked up at once by [`Self::resolve_all`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn entry(&self, height: Height) -> Arc<OnceCell<CommitState>> {
        if let Some(cell) = self.entries.read().await.get(&height) {
            return cell.clone();
        }
        self.entries
            .write()
            .await
            .entry(height)
            .or_default()
            .clone()
    }

    pub async fn resolve(&self, height: Height) -> CommitState {
        let cell = self.entry(height).await;
        cell.get_or_init(|| async {
            match self.source.find_commit(height).await {
                Ok(Some(commit_time)) => CommitState::Resolved(commit_time),
                Ok(None) => CommitState::Failed(format!("no commit event for height {height}")),
                Err(e) => CommitState::Failed(error_chain(&e)),
            }
        })
        .await
        .clone()
    }

    pub async fn commit_time(&self, height: Height) -> Option<i64> {
        match self.resolve(height).await {
            CommitState::Resolved(commit_time) => Some(commit_time),
            CommitState::Failed(_) => None,
        }
    }

    /// Resolves `heights` concurrently. Only resolved heights are returned; each failed
    /// height is logged.
    pub async fn resolve_all(
        &self,
        heights: impl IntoIterator<Item = Height>,
    ) -> BTreeMap<Height, i64> {
        let states = stream::iter(heights)
            .map(|height| async move { (height, self.resolve(height).await) })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut commit_times = BTreeMap::new();
        for (height, state) in states {
            match state {
                CommitState::Resolved(commit_time) => {
                    debug!("height {height} committed at {commit_time}");
                    commit_times.insert(height, commit_time);
                }
                CommitState::Failed(reason) => {
                    warn!("failed to resolve commit time for height {height}: {reason}");
                }
            }
        }
        commit_times
    }
}
