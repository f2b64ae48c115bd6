//! In-memory stand-ins for the clock, endpoints and commit-event source.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy_primitives::keccak256;
use async_trait::async_trait;

use crate::{
    clock::Clock,
    commit::CommitEventSource,
    endpoint::{LedgerRpc, RpcError},
    types::{Height, TxId},
    Result,
};

/// Clock that only moves when slept on or advanced explicitly.
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicI64,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            sleeps: Mutex::default(),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    /// Every duration passed to [`Clock::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps lock poisoned").clone()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .expect("sleeps lock poisoned")
            .push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

struct MockInclusion {
    height: Height,
    /// lookups that answer "not found" before the tx becomes visible
    hidden_lookups: usize,
    lookups: usize,
}

/// Endpoint that derives tx ids from payload hashes and answers lookups from a fixed table.
pub struct MockRpc {
    name: String,
    rejects: HashSet<Vec<u8>>,
    unavailable_lookups: bool,
    submit_delay: Option<(Arc<MockClock>, Duration)>,
    inclusions: Mutex<HashMap<TxId, MockInclusion>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    find_calls: AtomicUsize,
}

impl MockRpc {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rejects: HashSet::new(),
            unavailable_lookups: false,
            submit_delay: None,
            inclusions: Mutex::default(),
            submitted: Mutex::default(),
            find_calls: AtomicUsize::new(0),
        }
    }

    /// Identifier this mock returns for `payload`.
    pub fn tx_id(payload: &[u8]) -> TxId {
        TxId::new(keccak256(payload))
    }

    pub fn reject(mut self, payload: &[u8]) -> Self {
        self.rejects.insert(payload.to_vec());
        self
    }

    /// Makes `payload` visible at `height` after `hidden_lookups` lookups returned not-found.
    pub fn include(self, payload: &[u8], height: Height, hidden_lookups: usize) -> Self {
        self.inclusions
            .lock()
            .expect("inclusions lock poisoned")
            .insert(
                Self::tx_id(payload),
                MockInclusion {
                    height,
                    hidden_lookups,
                    lookups: 0,
                },
            );
        self
    }

    /// Each submit advances `clock` by `delay`, as if the call took that long.
    pub fn with_submit_delay(mut self, clock: Arc<MockClock>, delay: Duration) -> Self {
        self.submit_delay = Some((clock, delay));
        self
    }

    /// Every lookup fails with a transport-style error.
    pub fn unavailable_lookups(mut self) -> Self {
        self.unavailable_lookups = true;
        self
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().expect("submitted lock poisoned").clone()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerRpc for MockRpc {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, payload: &[u8]) -> std::result::Result<TxId, RpcError> {
        if self.rejects.contains(payload) {
            return Err(RpcError::Rejected {
                endpoint: self.name.to_owned(),
                code: 4,
                log: "signature verification failed".to_owned(),
            });
        }
        self.submitted
            .lock()
            .expect("submitted lock poisoned")
            .push(payload.to_vec());
        tokio::task::yield_now().await;
        if let Some((clock, delay)) = &self.submit_delay {
            clock.advance(*delay);
        }
        Ok(Self::tx_id(payload))
    }

    async fn find(&self, tx_id: &TxId) -> std::result::Result<Option<Height>, RpcError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable_lookups {
            return Err(RpcError::Unavailable(self.name.to_owned()));
        }
        let mut inclusions = self.inclusions.lock().expect("inclusions lock poisoned");
        let Some(inclusion) = inclusions.get_mut(tx_id) else {
            return Ok(None);
        };
        inclusion.lookups += 1;
        if inclusion.lookups > inclusion.hidden_lookups {
            Ok(Some(inclusion.height))
        } else {
            Ok(None)
        }
    }
}

/// Commit-event source backed by a map, counting lookups per height.
#[derive(Default)]
pub struct MockCommitSource {
    commits: HashMap<Height, i64>,
    lookup_delay: Duration,
    lookups: Mutex<HashMap<Height, usize>>,
}

impl MockCommitSource {
    pub fn new(commits: impl IntoIterator<Item = (Height, i64)>) -> Self {
        Self {
            commits: commits.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Holds every lookup open for `delay`, to widen race windows in tests.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn lookups(&self, height: Height) -> usize {
        self.lookups
            .lock()
            .expect("lookups lock poisoned")
            .get(&height)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommitEventSource for MockCommitSource {
    async fn find_commit(&self, height: Height) -> Result<Option<i64>> {
        *self
            .lookups
            .lock()
            .expect("lookups lock poisoned")
            .entry(height)
            .or_default() += 1;
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        Ok(self.commits.get(&height).copied())
    }
}
