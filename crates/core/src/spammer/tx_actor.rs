use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use super::{
    send_log::SendLog,
    types::{CallbackError, CallbackResult},
};
use crate::types::SendRecord;

pub enum TxActorMessage {
    SentTx {
        record: SendRecord,
        on_receive: oneshot::Sender<()>,
    },
    DumpCache {
        on_dump_cache: oneshot::Sender<Vec<SendRecord>>,
    },
}

impl std::fmt::Debug for TxActorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SentTx { record, .. } => write!(f, "SentTx({})", record.tx_id),
            Self::DumpCache { .. } => write!(f, "DumpCache"),
        }
    }
}

/// Single owner of the send log and the accepted-tx cache. Broadcast tasks talk to it
/// through [`TxActorHandle`], so log rows are written one at a time.
struct TxActor {
    receiver: mpsc::Receiver<TxActorMessage>,
    send_log: Option<SendLog>,
    cache: Vec<SendRecord>,
}

impl TxActor {
    fn new(receiver: mpsc::Receiver<TxActorMessage>, send_log: Option<SendLog>) -> Self {
        Self {
            receiver,
            send_log,
            cache: Vec::new(),
        }
    }

    fn handle_message(&mut self, message: TxActorMessage) -> CallbackResult<()> {
        match message {
            TxActorMessage::SentTx { record, on_receive } => {
                if let Some(send_log) = self.send_log.as_mut() {
                    send_log.append(&record)?;
                }
                debug!(
                    "tx {} sent to {} at {}",
                    record.tx_id, record.endpoint, record.send_time
                );
                self.cache.push(record);
                on_receive.send(()).map_err(CallbackError::OneshotSend)?;
            }
            TxActorMessage::DumpCache { on_dump_cache } => {
                if let Some(send_log) = self.send_log.as_mut() {
                    send_log.flush()?;
                }
                let records = std::mem::take(&mut self.cache);
                on_dump_cache
                    .send(records)
                    .map_err(|_| CallbackError::OneshotSend(()))?;
            }
        }
        Ok(())
    }

    async fn run(&mut self) -> CallbackResult<()> {
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg)?;
        }
        if let Some(send_log) = self.send_log.as_mut() {
            send_log.flush()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TxActorHandle {
    sender: mpsc::Sender<TxActorMessage>,
}

impl TxActorHandle {
    /// Spawns the actor. `send_log` is optional so callers can collect records without an artifact.
    pub fn new(bufsize: usize, send_log: Option<SendLog>) -> Self {
        let (sender, receiver) = mpsc::channel(bufsize);
        let mut actor = TxActor::new(receiver, send_log);
        tokio::task::spawn(async move {
            if let Err(e) = actor.run().await {
                error!("tx actor stopped: {e}");
            }
        });
        Self { sender }
    }

    /// Records an accepted tx. Resolves once the row is in the send log.
    pub async fn cache_send_record(&self, record: SendRecord) -> CallbackResult<()> {
        let (sender, receiver) = oneshot::channel();
        self.sender
            .send(TxActorMessage::SentTx {
                record,
                on_receive: sender,
            })
            .await
            .map_err(Box::new)?;
        receiver.await?;
        Ok(())
    }

    /// Flushes the send log and takes every record cached so far.
    pub async fn dump_cache(&self) -> CallbackResult<Vec<SendRecord>> {
        let (sender, receiver) = oneshot::channel();
        self.sender
            .send(TxActorMessage::DumpCache {
                on_dump_cache: sender,
            })
            .await
            .map_err(Box::new)?;
        Ok(receiver.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRpc;

    fn record(i: usize) -> SendRecord {
        SendRecord {
            sequence_index: i,
            tx_id: MockRpc::tx_id(&i.to_be_bytes()),
            send_time: 1000 + i as i64,
            endpoint: "node1".to_owned(),
        }
    }

    #[tokio::test]
    async fn caches_records_from_concurrent_senders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx_log.csv");
        let handle = TxActorHandle::new(4, Some(SendLog::create(&path).unwrap()));

        let tasks = (0..20)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.cache_send_record(record(i)).await })
            })
            .collect::<Vec<_>>();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let mut records = handle.dump_cache().await.unwrap();
        records.sort_by_key(|r| r.sequence_index);
        assert_eq!(records, (0..20).map(record).collect::<Vec<_>>());

        let mut logged = SendLog::read(&path).unwrap();
        logged.sort_by_key(|r| r.sequence_index);
        assert_eq!(logged, records);
    }

    #[tokio::test]
    async fn dump_empties_the_cache() {
        let handle = TxActorHandle::new(1, None);
        handle.cache_send_record(record(0)).await.unwrap();
        assert_eq!(handle.dump_cache().await.unwrap().len(), 1);
        assert!(handle.dump_cache().await.unwrap().is_empty());
    }
}
