use std::time::Duration;

use async_trait::async_trait;

/// Time source used to stamp sends and pace windows and retry rounds.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Wall-clock time in epoch milliseconds.
    fn now_millis(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the system time and the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
