//! Scan request queue (C9): a monotone-growing worklist the scanner worker
//! drains by start height, with condition-variable-style block-and-wait
//! semantics (here, a `Notify` standing in for the upstream `sync.Cond`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;
use uuid::Uuid;

use crate::scanner::watch_item::WatchItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub client_id: Uuid,
    pub start_height: u32,
    pub item: WatchItem,
    pub persistent: bool,
}

#[derive(Default)]
pub struct ScanRequestQueue {
    items: Mutex<VecDeque<ScanRequest>>,
    notify: Notify,
}

impl ScanRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, req: ScanRequest) {
        self.items.lock().unwrap().push_back(req);
        self.notify.notify_waiters();
    }

    /// Removes and returns every entry with `start_height == h`, preserving
    /// relative order; entries at other heights keep their relative order
    /// too.
    pub fn dequeue_at_height(&self, h: u32) -> Vec<ScanRequest> {
        let mut items = self.items.lock().unwrap();
        let mut matching = Vec::new();
        let mut remaining = VecDeque::with_capacity(items.len());
        for req in items.drain(..) {
            if req.start_height == h {
                matching.push(req);
            } else {
                remaining.push_back(req);
            }
        }
        *items = remaining;
        matching
    }

    pub fn peek(&self) -> Option<ScanRequest> {
        self.items.lock().unwrap().front().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Blocks until the queue is non-empty or `stop_flag` is set, whichever
    /// comes first.
    pub async fn wait_non_empty(&self, stop: &Notify, stop_flag: &AtomicBool) {
        loop {
            if !self.is_empty() || stop_flag.load(Ordering::SeqCst) {
                return;
            }
            let enqueued = self.notify.notified();
            let stopped = stop.notified();
            if !self.is_empty() || stop_flag.load(Ordering::SeqCst) {
                return;
            }
            tokio::select! {
                _ = enqueued => {}
                _ = stopped => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(height: u32) -> ScanRequest {
        ScanRequest {
            client_id: Uuid::new_v4(),
            start_height: height,
            item: WatchItem::Unspent {
                script: vec![height as u8],
            },
            persistent: false,
        }
    }

    #[test]
    fn dequeue_at_height_preserves_insertion_order() {
        let queue = ScanRequestQueue::new();
        let a = req(5);
        let b = req(5);
        let c = req(6);
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.enqueue(c.clone());

        let matched = queue.dequeue_at_height(5);
        assert_eq!(matched, vec![a, b]);
        assert_eq!(queue.peek(), Some(c));
    }

    #[tokio::test]
    async fn wait_non_empty_returns_once_enqueued() {
        let queue = std::sync::Arc::new(ScanRequestQueue::new());
        let stop = std::sync::Arc::new(Notify::new());
        let stop_flag = std::sync::Arc::new(AtomicBool::new(false));

        let waiter = {
            let queue = queue.clone();
            let stop = stop.clone();
            let stop_flag = stop_flag.clone();
            tokio::spawn(async move {
                queue.wait_non_empty(&stop, &stop_flag).await;
            })
        };
        queue.enqueue(req(1));
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn wait_non_empty_returns_on_stop_signal() {
        let queue = std::sync::Arc::new(ScanRequestQueue::new());
        let stop = std::sync::Arc::new(Notify::new());
        let stop_flag = std::sync::Arc::new(AtomicBool::new(false));

        let waiter = {
            let queue = queue.clone();
            let stop = stop.clone();
            let stop_flag = stop_flag.clone();
            tokio::spawn(async move {
                queue.wait_non_empty(&stop, &stop_flag).await;
            })
        };
        stop_flag.store(true, Ordering::SeqCst);
        stop.notify_waiters();
        waiter.await.unwrap();
    }
}
