//! Protocol engine (C5): owns the peer registry, drives the handshake state
//! machine (§4.5), dispatches inbound messages, and runs the header-monitor
//! and filter-monitor background tasks that persist what peers send.

pub mod peer;
pub mod protocol;
pub mod tcp_transport;

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify, RwLock};
use tracing::{debug, info, warn};

use crate::bip157::{CFilter, FilterEntry, FilterKey, FilterType, GetCfilters};
use crate::bip157::NODE_COMPACT_FILTERS;
use crate::codec::{CodecError, CodecResult, Decode, Encode, MessageHeader, VarInt};
use crate::node::mempool::MempoolTracker;
use crate::node::sync::HeaderSynchronizer;
use crate::storage::{BlockHeaderRepository, FilterRepository};
use crate::types::{BlockHeader, Hash, Transaction};

pub use peer::{Peer, PeerEvent, PeerId, PeerState};
pub use protocol::{
    BlockMessage, EmptyMessage, GetDataMessage, GetHeadersMessage, HeadersMessage, InvMessage,
    InventoryItem, NetworkAddress, NetworkMessage, PingMessage, PongMessage, VersionMessage,
    CMD_BLOCK, CMD_CFILTER, CMD_GETCFILTERS, CMD_GETDATA, CMD_GETHEADERS, CMD_HEADERS, CMD_INV,
    CMD_PING, CMD_PONG, CMD_SENDCMPCT, CMD_SENDHEADERS, CMD_TX, CMD_VERACK, CMD_VERSION,
    PROTOCOL_VERSION,
};

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("no peer available")]
    NoPeerAvailable,
    #[error("peer lacks NODE_COMPACT_FILTERS")]
    PeerLacksCf,
}

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Decodes a framed, checksum-validated payload into the message this
/// client understands. Unrecognized commands decode to `Unknown`, never an
/// error — the payload has already been fully read off the wire by this
/// point, so there is nothing left to drain.
pub fn decode_message(header: &MessageHeader, payload: &[u8]) -> CodecResult<NetworkMessage> {
    let mut cursor = Cursor::new(payload);
    Ok(match header.command.as_str() {
        CMD_VERSION => NetworkMessage::Version(VersionMessage::decode(&mut cursor)?),
        CMD_VERACK => {
            EmptyMessage::decode(&mut cursor)?;
            NetworkMessage::VerAck
        }
        CMD_PING => NetworkMessage::Ping(PingMessage::decode(&mut cursor)?),
        CMD_PONG => NetworkMessage::Pong(PongMessage::decode(&mut cursor)?),
        CMD_GETHEADERS => NetworkMessage::GetHeaders(GetHeadersMessage::decode(&mut cursor)?),
        CMD_HEADERS => NetworkMessage::Headers(HeadersMessage::decode(&mut cursor)?),
        CMD_GETCFILTERS => NetworkMessage::GetCfilters(GetCfilters::decode(&mut cursor)?),
        CMD_CFILTER => NetworkMessage::CFilter(CFilter::decode(&mut cursor)?),
        CMD_BLOCK => {
            let header = BlockHeader::decode(&mut cursor)?;
            let tx_count = VarInt::decode(&mut cursor)?.0 as usize;
            let mut transactions = Vec::with_capacity(tx_count);
            for _ in 0..tx_count {
                transactions.push(Transaction::decode(&mut cursor)?);
            }
            NetworkMessage::Block(Box::new(BlockMessage {
                header,
                transactions,
            }))
        }
        CMD_TX => NetworkMessage::Tx(Transaction::decode(&mut cursor)?),
        CMD_INV => NetworkMessage::Inv(InvMessage::decode(&mut cursor)?),
        CMD_GETDATA => NetworkMessage::GetData(GetDataMessage::decode(&mut cursor)?),
        CMD_SENDCMPCT => NetworkMessage::SendCmpct,
        CMD_SENDHEADERS => NetworkMessage::SendHeaders,
        other => NetworkMessage::Unknown {
            command: other.to_string(),
            length: header.length,
        },
    })
}

pub fn encode_message(magic: [u8; 4], msg: &NetworkMessage) -> Vec<u8> {
    let mut payload = Vec::new();
    match msg {
        NetworkMessage::Version(v) => v.encode(&mut payload),
        NetworkMessage::VerAck | NetworkMessage::SendHeaders | NetworkMessage::SendCmpct => {}
        NetworkMessage::Ping(p) | NetworkMessage::Pong(p) => p.encode(&mut payload),
        NetworkMessage::GetHeaders(g) => g.encode(&mut payload),
        NetworkMessage::Headers(h) => h.encode(&mut payload),
        NetworkMessage::GetCfilters(g) => g.encode(&mut payload),
        NetworkMessage::CFilter(c) => c.encode(&mut payload),
        NetworkMessage::Block(b) => {
            b.header.encode(&mut payload);
            VarInt(b.transactions.len() as u64).encode(&mut payload);
            for tx in &b.transactions {
                tx.encode(&mut payload);
            }
        }
        NetworkMessage::Tx(tx) => tx.encode(&mut payload),
        NetworkMessage::Inv(i) | NetworkMessage::GetData(i) => i.encode(&mut payload),
        NetworkMessage::Unknown { .. } => {}
    }
    let header = MessageHeader::for_payload(magic, msg.command(), &payload);
    let mut out = header.encode();
    out.extend_from_slice(&payload);
    out
}

/// Drives the local end of the handshake/keepalive/sync/filter cycle
/// against however many peers are connected. Spec §5 calls for exactly one
/// header-monitor task and one filter-monitor task per running engine; both
/// are spawned once from `start`.
pub struct ProtocolEngine {
    magic: [u8; 4],
    user_agent: String,
    genesis_hash: Hash,
    ping_interval: Duration,
    pong_timeout: Duration,
    peers: RwLock<HashMap<PeerId, Arc<Peer>>>,
    best_peer: RwLock<Option<PeerId>>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    events_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
    header_monitor_tx: mpsc::UnboundedSender<Vec<BlockHeader>>,
    header_monitor_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<Vec<BlockHeader>>>>,
    filter_monitor_tx: mpsc::UnboundedSender<CFilter>,
    filter_monitor_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<CFilter>>>,
    headers_repo: Arc<dyn BlockHeaderRepository>,
    filters_repo: Arc<dyn FilterRepository>,
    mempool: Arc<MempoolTracker>,
    sync: Arc<HeaderSynchronizer>,
    stopped: Notify,
}

impl ProtocolEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        magic: [u8; 4],
        user_agent: impl Into<String>,
        genesis_hash: Hash,
        headers_repo: Arc<dyn BlockHeaderRepository>,
        filters_repo: Arc<dyn FilterRepository>,
        mempool: Arc<MempoolTracker>,
        sync: Arc<HeaderSynchronizer>,
        ping_interval: Duration,
        pong_timeout: Duration,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (header_monitor_tx, header_monitor_rx) = mpsc::unbounded_channel();
        let (filter_monitor_tx, filter_monitor_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            magic,
            user_agent: user_agent.into(),
            genesis_hash,
            ping_interval,
            pong_timeout,
            peers: RwLock::new(HashMap::new()),
            best_peer: RwLock::new(None),
            events_tx,
            events_rx: AsyncMutex::new(Some(events_rx)),
            header_monitor_tx,
            header_monitor_rx: AsyncMutex::new(Some(header_monitor_rx)),
            filter_monitor_tx,
            filter_monitor_rx: AsyncMutex::new(Some(filter_monitor_rx)),
            headers_repo,
            filters_repo,
            mempool,
            sync,
            stopped: Notify::new(),
        })
    }

    /// Spawns the dispatch loop and the two monitor tasks, then dials the
    /// given peer address. May only be called once per engine instance.
    pub async fn start(self: &Arc<Self>, initial_peer: SocketAddr) -> NetworkResult<()> {
        let events_rx = self
            .events_rx
            .lock()
            .await
            .take()
            .expect("ProtocolEngine::start called twice");
        let header_monitor_rx = self
            .header_monitor_rx
            .lock()
            .await
            .take()
            .expect("ProtocolEngine::start called twice");
        let filter_monitor_rx = self
            .filter_monitor_rx
            .lock()
            .await
            .take()
            .expect("ProtocolEngine::start called twice");

        tokio::spawn(Arc::clone(self).dispatch_loop(events_rx));
        tokio::spawn(Arc::clone(self).header_monitor_loop(header_monitor_rx));
        tokio::spawn(Arc::clone(self).filter_monitor_loop(filter_monitor_rx));

        self.add_outbound_peer(initial_peer).await
    }

    /// Dials `addr`, registers it, and sends our `version`. The handshake
    /// proceeds in the dispatch loop from there.
    pub async fn add_outbound_peer(self: &Arc<Self>, addr: SocketAddr) -> NetworkResult<()> {
        let peer = Peer::connect(addr, self.magic, self.events_tx.clone()).await?;
        self.peers.write().await.insert(peer.id, Arc::clone(&peer));
        self.send_version(&peer).await;
        Ok(())
    }

    /// Force-closes every registered peer and wakes any keepalive tasks
    /// waiting on them.
    pub async fn stop(&self) {
        let peers = self.peers.write().await;
        for peer in peers.values() {
            peer.disconnect();
        }
        self.stopped.notify_waiters();
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Sends `tx` to every peer past the handshake; returns how many it
    /// reached.
    pub async fn broadcast_tx(&self, tx: Transaction) -> usize {
        let msg = NetworkMessage::Tx(tx);
        let mut sent = 0;
        for peer in self.peers.read().await.values() {
            if peer.state().await == PeerState::Ready && peer.send(&msg).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub async fn wait_synced(&self) {
        self.sync.wait_synced().await;
    }

    async fn send_version(&self, peer: &Arc<Peer>) {
        let height = self.sync.chain_tip_height().await;
        let mut nonce_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let addr = NetworkAddress {
            services: 0,
            ip: [0u8; 16],
            port: 0,
        };
        let msg = NetworkMessage::Version(VersionMessage {
            version: PROTOCOL_VERSION,
            services: NODE_COMPACT_FILTERS,
            timestamp: crate::utils::current_timestamp() as i64,
            addr_recv: addr.clone(),
            addr_from: addr,
            nonce: u64::from_le_bytes(nonce_bytes),
            user_agent: self.user_agent.clone(),
            start_height: height,
            relay: false,
        });
        let _ = peer.send(&msg);
    }

    async fn any_ready_peer(&self) -> Option<Arc<Peer>> {
        let peers = self.peers.read().await;
        for peer in peers.values() {
            if peer.state().await == PeerState::Ready {
                return Some(Arc::clone(peer));
            }
        }
        None
    }

    async fn best_peer_handle(&self) -> Option<Arc<Peer>> {
        let best = *self.best_peer.read().await;
        match best {
            Some(id) => self.peers.read().await.get(&id).cloned(),
            None => None,
        }
    }

    async fn best_peer_tip(&self) -> u32 {
        match self.best_peer_handle().await {
            Some(peer) => peer.peers_tip(),
            None => 0,
        }
    }

    /// Sends a fresh `getheaders` to the best peer (falling back to any
    /// ready peer if no best peer has been chosen yet).
    async fn trigger_sync_round(&self) {
        let Some(peer) = match self.best_peer_handle().await {
            Some(p) => Some(p),
            None => self.any_ready_peer().await,
        } else {
            return;
        };
        let locator = self.sync.locator().await;
        let msg = NetworkMessage::GetHeaders(GetHeadersMessage {
            version: PROTOCOL_VERSION,
            locator: crate::codec::BlockLocators(locator),
            stop_hash: [0u8; 32],
        });
        let _ = peer.send(&msg);
    }

    async fn request_cfilter(&self, height: u32, hash: Hash) {
        let Some(peer) = self.any_ready_peer().await else {
            return;
        };
        let msg = NetworkMessage::GetCfilters(GetCfilters {
            filter_type: FilterType::Regular.to_u8(),
            start_height: height,
            stop_hash: hash,
        });
        let _ = peer.send(&msg);
    }

    async fn disconnect_peer(&self, id: PeerId) {
        let removed = self.peers.write().await.remove(&id);
        if let Some(peer) = removed {
            peer.disconnect();
        }
        let mut best = self.best_peer.write().await;
        if *best == Some(id) {
            *best = None;
        }
    }

    async fn dispatch_loop(self: Arc<Self>, mut events_rx: mpsc::UnboundedReceiver<PeerEvent>) {
        while let Some(event) = events_rx.recv().await {
            match event {
                PeerEvent::Message(id, msg) => self.handle_message(id, msg).await,
                PeerEvent::Disconnected(id) => {
                    debug!(peer = %id, "peer disconnected");
                    self.disconnect_peer(id).await;
                }
            }
        }
    }

    async fn handle_message(self: &Arc<Self>, id: PeerId, msg: NetworkMessage) {
        let Some(peer) = self.peers.read().await.get(&id).cloned() else {
            return;
        };
        match msg {
            NetworkMessage::Version(v) => self.handle_version(&peer, v).await,
            NetworkMessage::VerAck => self.handle_verack(&peer).await,
            NetworkMessage::Ping(p) => {
                let _ = peer.send(&NetworkMessage::Pong(p));
            }
            NetworkMessage::Pong(p) => {
                peer.fulfill_pong(p.nonce);
            }
            NetworkMessage::Headers(h) => self.handle_headers(&peer, h.headers).await,
            NetworkMessage::GetCfilters(g) => self.handle_getcfilters(&peer, g).await,
            NetworkMessage::CFilter(c) => {
                let _ = self.filter_monitor_tx.send(c);
            }
            NetworkMessage::Block(b) => self.handle_block(&peer, *b).await,
            NetworkMessage::Tx(tx) => self.mempool.add(tx).await,
            NetworkMessage::Inv(inv) => {
                let get_data = NetworkMessage::GetData(GetDataMessage {
                    items: inv.items,
                });
                let _ = peer.send(&get_data);
            }
            NetworkMessage::GetHeaders(_)
            | NetworkMessage::GetData(_)
            | NetworkMessage::SendCmpct
            | NetworkMessage::SendHeaders
            | NetworkMessage::Unknown { .. } => {}
        }
    }

    async fn handle_version(self: &Arc<Self>, peer: &Arc<Peer>, v: VersionMessage) {
        if peer.state().await != PeerState::Dialed {
            return;
        }
        if v.services & NODE_COMPACT_FILTERS == 0 {
            warn!(peer = %peer.id, "peer lacks NODE_COMPACT_FILTERS, dropping");
            self.disconnect_peer(peer.id).await;
            return;
        }
        peer.bump_peers_tip(v.start_height);
        let _ = peer.send(&NetworkMessage::VerAck);
        let _ = peer.send(&NetworkMessage::SendHeaders);
        peer.set_state(PeerState::HandshakeAcked).await;
    }

    async fn handle_verack(self: &Arc<Self>, peer: &Arc<Peer>) {
        if peer.state().await != PeerState::HandshakeAcked {
            return;
        }
        peer.set_state(PeerState::Ready).await;
        info!(peer = %peer.id, "handshake complete");

        let became_best = {
            let mut best = self.best_peer.write().await;
            if best.is_none() {
                *best = Some(peer.id);
                true
            } else {
                false
            }
        };

        tokio::spawn(Arc::clone(self).keepalive_loop(Arc::clone(peer)));

        if became_best {
            self.trigger_sync_round().await;
        }
        let peers_tip = self.best_peer_tip().await;
        self.sync.check_synced(peers_tip).await;
    }

    async fn handle_headers(&self, peer: &Arc<Peer>, headers: Vec<BlockHeader>) {
        if headers.is_empty() {
            return;
        }
        for pair in headers.windows(2) {
            if pair[1].height != pair[0].height + 1 {
                warn!(peer = %peer.id, "non-consecutive headers batch, dropping");
                return;
            }
        }

        let tip = self.sync.chain_tip_height().await;
        let first_height = headers[0].height;
        let last_height = headers[headers.len() - 1].height;

        peer.bump_peers_tip(last_height);

        if last_height <= tip {
            return;
        }

        let trimmed: Vec<BlockHeader> = if first_height <= tip {
            headers.into_iter().filter(|h| h.height > tip).collect()
        } else {
            headers
        };

        let _ = self.header_monitor_tx.send(trimmed);
        self.trigger_sync_round().await;
    }

    async fn handle_getcfilters(&self, peer: &Arc<Peer>, g: GetCfilters) {
        if g.filter_type != FilterType::Regular.to_u8() {
            return;
        }
        let Ok(stop_header) = self.headers_repo.get_by_hash(&g.stop_hash).await else {
            return;
        };
        let end_height = stop_header.height;
        if end_height < g.start_height || end_height - g.start_height >= 1000 {
            return;
        }

        let mut height = end_height;
        while height > g.start_height {
            if let Ok(hash) = self.headers_repo.get_hash_by_height(height).await {
                let key = FilterKey::new(hash, FilterType::Regular);
                if let Ok(entry) = self.filters_repo.get(&key).await {
                    let msg = NetworkMessage::CFilter(CFilter {
                        filter_type: FilterType::Regular.to_u8(),
                        block_hash: hash,
                        filter_bytes: entry.nbytes,
                    });
                    let _ = peer.send(&msg);
                }
            }
            height -= 1;
        }
    }

    async fn handle_block(&self, peer: &Arc<Peer>, block: BlockMessage) {
        let tip = self.sync.chain_tip_height().await;
        let height = block.header.height;

        if height != tip + 1 {
            if peer.bump_peers_tip(height) {
                self.trigger_sync_round().await;
            }
            return;
        }

        let full_block = crate::types::Block {
            header: block.header.clone(),
            transactions: block.transactions,
        };
        let _ = self.header_monitor_tx.send(vec![block.header]);
        self.mempool.confirm_in_block(&full_block).await;
    }

    async fn header_monitor_loop(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<Vec<BlockHeader>>,
    ) {
        while let Some(batch) = rx.recv().await {
            for header in batch {
                let height = header.height;
                let hash = header.hash();
                if let Err(e) = self.headers_repo.write(vec![header]).await {
                    warn!(height, error = %e, "failed to persist header");
                    continue;
                }
                self.request_cfilter(height, hash).await;
            }
            let peers_tip = self.best_peer_tip().await;
            self.sync.check_synced(peers_tip).await;
        }
    }

    async fn filter_monitor_loop(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<CFilter>) {
        while let Some(cfilter) = rx.recv().await {
            let Ok(filter_type) = FilterType::from_u8(cfilter.filter_type) else {
                continue;
            };
            let entry = FilterEntry {
                key: FilterKey::new(cfilter.block_hash, filter_type),
                nbytes: cfilter.filter_bytes,
            };
            if let Err(e) = self.filters_repo.put(entry).await {
                warn!(error = %e, "failed to store filter");
            }
        }
    }

    async fn keepalive_loop(self: Arc<Self>, peer: Arc<Peer>) {
        let mut ticker = tokio::time::interval(self.ping_interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                _ = self.stopped.notified() => return,
                _ = ticker.tick() => {}
            }
            if peer.state().await == PeerState::Disconnected
                || !self.peers.read().await.contains_key(&peer.id)
            {
                return;
            }

            let mut nonce_bytes = [0u8; 8];
            rand::thread_rng().fill_bytes(&mut nonce_bytes);
            let nonce = u64::from_le_bytes(nonce_bytes);
            let waiter = peer.await_pong(nonce);
            if peer.send(&NetworkMessage::Ping(PingMessage { nonce })).is_err() {
                return;
            }

            match tokio::time::timeout(self.pong_timeout, waiter).await {
                Ok(Ok(())) => debug!(peer = %peer.id, "pong received"),
                _ => {
                    warn!(peer = %peer.id, "pong missing or timed out, disconnecting");
                    self.disconnect_peer(peer.id).await;
                    return;
                }
            }
        }
    }
}
