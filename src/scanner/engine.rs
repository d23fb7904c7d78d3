//! Scanner engine (C10): the single-threaded worker that walks new blocks
//! height by height, tests queued watch items against each block's
//! compact filter, and fetches the block itself only on a filter match.
//! Grounded in the original implementation's `scannerService`
//! (`pkg/scanner/scanner.go`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::bip157::{FilterKey, FilterType};
use crate::bip158::{self, GcsFilter};
use crate::node::block_service::BlockService;
use crate::scanner::queue::{ScanRequest, ScanRequestQueue};
use crate::scanner::watch_item::WatchItem;
use crate::storage::{BlockHeaderRepository, FilterRepository};
use crate::types::{Hash, Transaction};

#[derive(thiserror::Error, Debug)]
pub enum ScannerError {
    #[error("scanner already started")]
    AlreadyStarted,
    #[error("watch options must specify a watch item")]
    MissingWatchItem,
}

/// Recognized but not all wired up in this version, per spec's explicit
/// allowance for an extensible event-type tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    UnspentUtxo,
    SpentUtxo,
}

/// External collaborator interface: descriptor grammar parsing is out of
/// scope here, only its consumption contract.
pub trait DescriptorSource: Send + Sync {
    fn is_range(&self, descriptor: &str) -> bool;
    fn derive_scripts(&self, descriptor: &str, count: usize) -> Vec<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub transaction: Transaction,
    pub block_hash: Hash,
    pub block_height: u32,
    pub request: ScanRequest,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    start_height: u32,
    item: Option<WatchItem>,
    persistent: bool,
    request_id: Uuid,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            start_height: 0,
            item: None,
            persistent: false,
            request_id: Uuid::new_v4(),
        }
    }
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_height(mut self, height: u32) -> Self {
        self.start_height = height;
        self
    }

    pub fn with_watch_item(mut self, item: WatchItem) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = id;
        self
    }
}

pub struct Scanner {
    headers_repo: Arc<dyn BlockHeaderRepository>,
    filters_repo: Arc<dyn FilterRepository>,
    block_service: Arc<dyn BlockService>,
    genesis_hash: Hash,
    queue: Arc<ScanRequestQueue>,
    stop_notify: Notify,
    stop_flag: AtomicBool,
    started: AtomicBool,
}

impl Scanner {
    pub fn new(
        headers_repo: Arc<dyn BlockHeaderRepository>,
        filters_repo: Arc<dyn FilterRepository>,
        block_service: Arc<dyn BlockService>,
        genesis_hash: Hash,
    ) -> Arc<Self> {
        Arc::new(Self {
            headers_repo,
            filters_repo,
            block_service,
            genesis_hash,
            queue: Arc::new(ScanRequestQueue::new()),
            stop_notify: Notify::new(),
            stop_flag: AtomicBool::new(false),
            started: AtomicBool::new(false),
        })
    }

    /// Idempotent-if-stopped; a double-start is an error.
    pub fn start(self: &Arc<Self>) -> Result<mpsc::UnboundedReceiver<Report>, ScannerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ScannerError::AlreadyStarted);
        }
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let scanner = Arc::clone(self);
        tokio::spawn(async move {
            scanner.run_worker(reports_tx).await;
        });
        Ok(reports_rx)
    }

    /// Signals the worker; by the time this returns the stream is
    /// considered closed (the worker exits at its next wake or pass
    /// boundary and drops `reports_tx`).
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    pub fn watch(&self, options: WatchOptions) -> Result<(), ScannerError> {
        let item = options.item.ok_or(ScannerError::MissingWatchItem)?;
        self.queue.enqueue(ScanRequest {
            client_id: options.request_id,
            start_height: options.start_height,
            item,
            persistent: options.persistent,
        });
        Ok(())
    }

    pub fn watch_descriptor_wallet(
        &self,
        client_id: Uuid,
        descriptor: &str,
        source: &dyn DescriptorSource,
        event_types: &[WatchEventType],
        start_height: u32,
    ) -> Result<(), ScannerError> {
        let count = if source.is_range(descriptor) { 100 } else { 1 };
        let scripts = source.derive_scripts(descriptor, count);
        for event_type in event_types {
            if *event_type != WatchEventType::UnspentUtxo {
                continue;
            }
            for script in &scripts {
                self.watch(
                    WatchOptions::new()
                        .with_watch_item(WatchItem::Unspent {
                            script: script.clone(),
                        })
                        .with_start_height(start_height)
                        .with_persistent()
                        .with_request_id(client_id),
                )?;
            }
        }
        Ok(())
    }

    async fn run_worker(self: Arc<Self>, reports_tx: mpsc::UnboundedSender<Report>) {
        loop {
            self.queue
                .wait_non_empty(&self.stop_notify, &self.stop_flag)
                .await;
            if self.stop_flag.load(Ordering::SeqCst) {
                return;
            }
            let Some(first) = self.queue.peek() else {
                continue;
            };
            self.run_pass(first.start_height, &reports_tx).await;
            if self.stop_flag.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    async fn run_pass(&self, start_height: u32, reports_tx: &mpsc::UnboundedSender<Report>) {
        let mut h = start_height;
        let mut batch: Vec<ScanRequest> = Vec::new();
        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            let tip_height = match self.headers_repo.chain_tip().await {
                Ok(tip) => tip.height,
                Err(_) => break,
            };
            if h > tip_height {
                break;
            }
            batch.extend(self.queue.dequeue_at_height(h));
            if !batch.is_empty() {
                let block_hash = if h == 0 {
                    self.genesis_hash
                } else {
                    match self.headers_repo.get_hash_by_height(h).await {
                        Ok(hash) => hash,
                        Err(_) => {
                            h += 1;
                            continue;
                        }
                    }
                };
                if self.filter_matches(&batch, &block_hash).await {
                    let (reports, remain) = self.extract_matches(&block_hash, h, batch).await;
                    for report in &reports {
                        let _ = reports_tx.send(report.clone());
                        if report.request.persistent {
                            self.queue.enqueue(ScanRequest {
                                client_id: report.request.client_id,
                                start_height: report.block_height + 1,
                                item: report.request.item.clone(),
                                persistent: true,
                            });
                        }
                    }
                    batch = remain;
                }
            }
            h += 1;
        }
        for req in batch {
            self.queue.enqueue(req);
        }
    }

    async fn filter_matches(&self, batch: &[ScanRequest], block_hash: &Hash) -> bool {
        let key = FilterKey::new(*block_hash, FilterType::Regular);
        let entry = match self.filters_repo.get(&key).await {
            Ok(entry) => entry,
            Err(_) => return false,
        };
        let Some(filter) = GcsFilter::from_bytes(&entry.nbytes) else {
            return false;
        };
        let gcs_key = bip158::derive_key(block_hash);
        let items: Vec<Vec<u8>> = batch.iter().map(|r| r.item.bytes()).collect();
        bip158::match_any(&filter, gcs_key, &items)
    }

    /// On `block_not_found`, returns `([], requests)` unchanged so the
    /// caller carries the whole batch forward — the filter may have
    /// arrived ahead of the block itself.
    async fn extract_matches(
        &self,
        block_hash: &Hash,
        height: u32,
        requests: Vec<ScanRequest>,
    ) -> (Vec<Report>, Vec<ScanRequest>) {
        let block = match self.block_service.get_block(block_hash).await {
            Ok(block) => block,
            Err(_) => return (Vec::new(), requests),
        };
        let mut reports = Vec::new();
        let mut remain = Vec::new();
        for req in requests {
            let mut matched = false;
            for tx in &block.transactions {
                if req.item.matches(tx) {
                    matched = true;
                    reports.push(Report {
                        transaction: tx.clone(),
                        block_hash: *block_hash,
                        block_height: height,
                        request: req.clone(),
                    });
                }
            }
            if !matched {
                remain.push(req);
            }
        }
        (reports, remain)
    }
}
