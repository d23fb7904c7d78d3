//! Node orchestration: wires storage, the protocol engine, the header
//! synchronizer, the mempool tracker, and the scanner into the single
//! object a CLI front-end or embedding application drives.

pub mod block_service;
pub mod mempool;
pub mod sync;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::info;
use uuid::Uuid;

use crate::codec::Decode;
use crate::config::Config;
use crate::network::ProtocolEngine;
use crate::node::block_service::{BlockService, HttpBlockService};
use crate::node::mempool::MempoolTracker;
use crate::node::sync::HeaderSynchronizer;
use crate::scanner::{DescriptorSource, Report, Scanner, ScannerError, WatchEventType, WatchOptions};
use crate::storage::memory::{MemoryFilterStore, MemoryHeaderStore};
use crate::storage::{BlockHeaderRepository, FilterRepository};
use crate::types::{BlockHeader, Transaction};

/// Top-level orchestrator. Holds no global state of its own beyond the
/// handles it was built from — see `config::Config`'s doc comment on why
/// there is no singleton config here.
pub struct Node {
    config: Config,
    engine: Arc<ProtocolEngine>,
    sync: Arc<HeaderSynchronizer>,
    mempool: Arc<MempoolTracker>,
    scanner: Arc<Scanner>,
    headers_repo: Arc<dyn BlockHeaderRepository>,
    reports_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<Report>>>,
}

impl Node {
    /// Assembles a node from configuration using the in-memory storage
    /// backend. Nothing is started yet; call `start`.
    pub fn new(config: Config) -> Self {
        let headers_repo: Arc<dyn BlockHeaderRepository> = Arc::new(MemoryHeaderStore::new());
        let filters_repo: Arc<dyn FilterRepository> = Arc::new(MemoryFilterStore::new());
        let block_service: Arc<dyn BlockService> = Arc::new(HttpBlockService::new(
            config.block_service_url.clone(),
            Duration::from_secs(config.timeouts.block_service_timeout_secs),
        ));

        let mempool = MempoolTracker::new(Duration::from_secs(config.timeouts.mempool_ttl_secs));
        let sync = Arc::new(HeaderSynchronizer::new(
            Arc::clone(&headers_repo),
            config.network.genesis_hash(),
        ));
        let scanner = Scanner::new(
            Arc::clone(&headers_repo),
            Arc::clone(&filters_repo),
            block_service,
            config.network.genesis_hash(),
        );

        let engine = ProtocolEngine::new(
            config.network.magic(),
            config.user_agent.clone(),
            config.network.genesis_hash(),
            Arc::clone(&headers_repo),
            filters_repo,
            Arc::clone(&mempool),
            Arc::clone(&sync),
            Duration::from_secs(config.timeouts.ping_interval_secs),
            Duration::from_secs(config.timeouts.pong_timeout_secs),
        );

        Self {
            config,
            engine,
            sync,
            mempool,
            scanner,
            headers_repo,
            reports_rx: AsyncMutex::new(None),
        }
    }

    /// Dials the configured peer, starts the protocol engine, the mempool
    /// sweep, and the scanner worker.
    pub async fn start(&self) -> Result<()> {
        let peer_addr: SocketAddr = self
            .config
            .peer_addr
            .parse()
            .with_context(|| format!("invalid peer_addr {:?}", self.config.peer_addr))?;

        info!(peer = %peer_addr, network = ?self.config.network, "starting node");

        self.mempool
            .spawn_sweep(Duration::from_secs(self.config.timeouts.mempool_sweep_interval_secs));

        let reports_rx = self
            .scanner
            .start()
            .map_err(|e| anyhow::anyhow!("scanner already started: {e}"))?;
        *self.reports_rx.lock().await = Some(reports_rx);

        self.engine
            .start(peer_addr)
            .await
            .context("failed to start protocol engine")?;

        Ok(())
    }

    pub async fn stop(&self) {
        info!("stopping node");
        self.scanner.stop();
        self.engine.stop().await;
    }

    pub async fn add_outbound_peer(&self, addr: SocketAddr) -> Result<()> {
        self.engine
            .add_outbound_peer(addr)
            .await
            .context("failed to add outbound peer")
    }

    pub async fn peer_count(&self) -> usize {
        self.engine.peer_count().await
    }

    pub async fn chain_tip(&self) -> Option<BlockHeader> {
        self.headers_repo.chain_tip().await.ok()
    }

    /// Blocks until the initial header sync has caught up with the best
    /// peer's advertised tip.
    pub async fn wait_synced(&self) {
        self.sync.wait_synced().await;
    }

    /// Decodes `tx_hex` and broadcasts the transaction to every connected
    /// peer, tracking it locally as unconfirmed.
    pub async fn send_transaction(&self, tx_hex: &str) -> Result<()> {
        let bytes = hex::decode(tx_hex).with_context(|| format!("invalid tx hex {tx_hex:?}"))?;
        let tx = Transaction::decode(&mut std::io::Cursor::new(bytes))
            .with_context(|| format!("malformed transaction in {tx_hex:?}"))?;
        self.mempool.add(tx.clone()).await;
        self.engine.broadcast_tx(tx).await;
        Ok(())
    }

    pub fn watch(&self, options: WatchOptions) -> Result<(), ScannerError> {
        self.scanner.watch(options)
    }

    pub fn watch_descriptor_wallet(
        &self,
        client_id: Uuid,
        descriptor: &str,
        source: &dyn DescriptorSource,
        event_types: &[WatchEventType],
        start_height: u32,
    ) -> Result<(), ScannerError> {
        self.scanner
            .watch_descriptor_wallet(client_id, descriptor, source, event_types, start_height)
    }

    /// Takes the scan-report receiver. Only the first caller after `start`
    /// gets it; subsequent calls return `None`.
    pub async fn take_reports(&self) -> Option<mpsc::UnboundedReceiver<Report>> {
        self.reports_rx.lock().await.take()
    }
}
