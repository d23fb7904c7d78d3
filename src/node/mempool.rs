//! Mempool tracker (C7): an in-memory view of transactions this client has
//! seen but not yet confirmed. Tracks at most one entry per txid and fans
//! out lifecycle events to subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::types::{Block, Hash, Transaction};

#[derive(Debug, Clone)]
pub enum TxEvent {
    Unconfirmed(Hash),
    Confirmed(Hash, Transaction),
    Rejected(Hash, Transaction),
}

struct Entry {
    tx: Transaction,
    inserted_at: Instant,
}

/// Thread-safe: the transaction map and the subscriber list are each
/// guarded independently, and notifying subscribers never blocks the
/// caller beyond taking the subscriber-list read lock.
pub struct MempoolTracker {
    entries: RwLock<HashMap<Hash, Entry>>,
    subscribers: RwLock<HashMap<Uuid, mpsc::UnboundedSender<TxEvent>>>,
    ttl: Duration,
}

impl MempoolTracker {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    /// Spawns the periodic sweep task that evicts entries older than `ttl`.
    /// Runs for the process lifetime; there is no explicit stop handle
    /// since the tracker itself is never torn down independently of the
    /// node.
    pub fn spawn_sweep(self: &Arc<Self>, interval: Duration) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                tracker.sweep().await;
            }
        });
    }

    pub async fn add(&self, tx: Transaction) {
        let txid = tx.txid();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&txid) {
            return;
        }
        entries.insert(
            txid,
            Entry {
                tx,
                inserted_at: Instant::now(),
            },
        );
        drop(entries);
        self.emit(TxEvent::Unconfirmed(txid)).await;
    }

    pub async fn confirm_in_block(&self, block: &Block) {
        let confirmed_ids: Vec<Hash> = block.transactions.iter().map(|tx| tx.txid()).collect();
        let mut confirmed = Vec::new();
        {
            let mut entries = self.entries.write().await;
            for txid in &confirmed_ids {
                if let Some(entry) = entries.remove(txid) {
                    confirmed.push((*txid, entry.tx));
                }
            }
        }
        for (txid, tx) in confirmed {
            self.emit(TxEvent::Confirmed(txid, tx)).await;
        }
    }

    pub async fn subscribe(&self, id: Uuid) -> mpsc::UnboundedReceiver<TxEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.insert(id, tx);
        rx
    }

    pub async fn pending_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn contains(&self, txid: &Hash) -> bool {
        self.entries.read().await.contains_key(txid)
    }

    async fn sweep(&self) {
        let now = Instant::now();
        let mut expired = Vec::new();
        {
            let mut entries = self.entries.write().await;
            entries.retain(|txid, entry| {
                if now.duration_since(entry.inserted_at) > self.ttl {
                    expired.push((*txid, entry.tx.clone()));
                    false
                } else {
                    true
                }
            });
        }
        debug!(evicted = expired.len(), "mempool sweep");
        for (txid, tx) in expired {
            self.emit(TxEvent::Rejected(txid, tx)).await;
        }
    }

    async fn emit(&self, event: TxEvent) {
        let subscribers = self.subscribers.read().await;
        for sender in subscribers.values() {
            let _ = sender.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHeader;

    fn tx(lock_time: u32) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            lock_time,
        }
    }

    fn block(transactions: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                prev_block_hash: [0u8; 32],
                merkle_root: [0u8; 32],
                timestamp: 0,
                height: 1,
                proof: vec![],
            },
            transactions,
        }
    }

    #[tokio::test]
    async fn add_then_confirm_removes_entry() {
        let tracker = MempoolTracker::new(Duration::from_secs(300));
        let t = tx(1);
        tracker.add(t.clone()).await;
        assert!(tracker.contains(&t.txid()).await);
        assert_eq!(tracker.pending_count().await, 1);

        tracker.confirm_in_block(&block(vec![t.clone()])).await;
        assert!(!tracker.contains(&t.txid()).await);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn add_is_idempotent_per_txid() {
        let tracker = MempoolTracker::new(Duration::from_secs(300));
        let t = tx(2);
        tracker.add(t.clone()).await;
        tracker.add(t.clone()).await;
        assert_eq!(tracker.pending_count().await, 1);
    }

    #[tokio::test]
    async fn subscriber_receives_lifecycle_events_in_order() {
        let tracker = MempoolTracker::new(Duration::from_secs(300));
        let mut rx = tracker.subscribe(Uuid::new_v4()).await;
        let t = tx(3);
        tracker.add(t.clone()).await;
        tracker.confirm_in_block(&block(vec![t.clone()])).await;

        match rx.recv().await.unwrap() {
            TxEvent::Unconfirmed(txid) => assert_eq!(txid, t.txid()),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            TxEvent::Confirmed(txid, _) => assert_eq!(txid, t.txid()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sweep_evicts_stale_entries_and_emits_rejected() {
        let tracker = MempoolTracker::new(Duration::from_millis(1));
        let mut rx = tracker.subscribe(Uuid::new_v4()).await;
        let t = tx(4);
        tracker.add(t.clone()).await;
        let _ = rx.recv().await.unwrap(); // Unconfirmed

        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.sweep().await;

        assert!(!tracker.contains(&t.txid()).await);
        match rx.recv().await.unwrap() {
            TxEvent::Rejected(txid, _) => assert_eq!(txid, t.txid()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
