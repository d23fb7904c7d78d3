//! Per-peer connection state: handshake progress, liveness bookkeeping,
//! and the read/write task pair that frames and drains the wire for one
//! remote. The protocol engine (`network::mod`) owns the peer registry and
//! dispatch; a `Peer` is just the handle it holds per remote.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tracing::{debug, warn};

use crate::codec::MAX_MESSAGE_LENGTH;
use crate::network::tcp_transport::{TcpReader, TcpTransport, TcpWriter};
use crate::network::{decode_message, encode_message, NetworkMessage};

/// Opaque peer handle: the remote's socket address is sufficient, per
/// spec's "local-side address of the TCP socket" note.
pub type PeerId = SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// We have sent our `version` and are waiting for the peer's.
    Dialed,
    /// The peer's `version` arrived and was accepted; waiting for `verack`.
    HandshakeAcked,
    /// Handshake complete; normal message handling applies.
    Ready,
    Disconnected,
}

/// Events the read loop reports up to the protocol engine's dispatch task.
pub enum PeerEvent {
    Message(PeerId, NetworkMessage),
    Disconnected(PeerId),
}

/// A connected peer as held in the protocol engine's registry.
pub struct Peer {
    pub id: PeerId,
    magic: [u8; 4],
    write_tx: mpsc::UnboundedSender<Vec<u8>>,
    state: Mutex<PeerState>,
    /// `peers_tip`: the highest height this peer has announced, bumped on
    /// `inv`/`block` rumors of a future block (spec §4.6).
    peers_tip: AtomicU32,
    pong_waiters: StdMutex<HashMap<u64, oneshot::Sender<()>>>,
    cancel: Arc<Notify>,
}

impl Peer {
    /// Dials `addr`, sends nothing yet, and spawns the read/write task
    /// pair. The caller (protocol engine) still owns sending the initial
    /// `version` message and registering the peer.
    pub async fn connect(
        addr: SocketAddr,
        magic: [u8; 4],
        events_tx: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<Peer>, crate::codec::CodecError> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::spawn(transport, magic, events_tx))
    }

    /// Wraps an already-established transport (used by tests and by any
    /// future inbound-accept path) in a registry entry with its read/write
    /// tasks running.
    pub fn spawn(
        transport: TcpTransport,
        magic: [u8; 4],
        events_tx: mpsc::UnboundedSender<PeerEvent>,
    ) -> Arc<Peer> {
        let id = transport.peer_addr();
        let (reader, writer) = transport.into_split(magic);
        let (write_tx, write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let cancel = Arc::new(Notify::new());

        tokio::spawn(read_loop(reader, events_tx, Arc::clone(&cancel)));
        tokio::spawn(write_loop(writer, write_rx, Arc::clone(&cancel)));

        Arc::new(Peer {
            id,
            magic,
            write_tx,
            state: Mutex::new(PeerState::Dialed),
            peers_tip: AtomicU32::new(0),
            pong_waiters: StdMutex::new(HashMap::new()),
            cancel,
        })
    }

    /// Force-closes this peer's connection: wakes the read and write
    /// loops out of any in-flight operation so they drop their transport
    /// halves and exit.
    pub fn disconnect(&self) {
        self.cancel.notify_waiters();
    }

    pub async fn state(&self) -> PeerState {
        *self.state.lock().await
    }

    pub async fn set_state(&self, new_state: PeerState) {
        *self.state.lock().await = new_state;
    }

    pub fn peers_tip(&self) -> u32 {
        self.peers_tip.load(Ordering::SeqCst)
    }

    /// Bumps `peers_tip` if `height` is higher than what's recorded;
    /// returns whether the tip actually advanced.
    pub fn bump_peers_tip(&self, height: u32) -> bool {
        let mut advanced = false;
        let mut current = self.peers_tip.load(Ordering::SeqCst);
        while height > current {
            match self.peers_tip.compare_exchange_weak(
                current,
                height,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    advanced = true;
                    break;
                }
                Err(observed) => current = observed,
            }
        }
        advanced
    }

    pub fn send(&self, msg: &NetworkMessage) -> Result<(), mpsc::error::SendError<Vec<u8>>> {
        let bytes = encode_message(self.magic, msg);
        self.write_tx.send(bytes)
    }

    /// Registers a pending pong wait for `nonce`; the dispatch loop fires
    /// the returned sender's match when a `pong` with that nonce arrives.
    pub fn await_pong(&self, nonce: u64) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.pong_waiters.lock().unwrap().insert(nonce, tx);
        rx
    }

    pub fn fulfill_pong(&self, nonce: u64) -> bool {
        if let Some(tx) = self.pong_waiters.lock().unwrap().remove(&nonce) {
            let _ = tx.send(());
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    mut reader: TcpReader,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    cancel: Arc<Notify>,
) {
    let id = reader.peer_addr();
    loop {
        let header = tokio::select! {
            _ = cancel.notified() => break,
            result = reader.read_header() => match result {
                Ok(h) => h,
                Err(_) => break, // short_read on the header implies EOF
            },
        };

        if header.length as usize > MAX_MESSAGE_LENGTH {
            warn!(peer = %id, length = header.length, "length exceeds limit, disconnecting");
            break;
        }

        let payload = tokio::select! {
            _ = cancel.notified() => break,
            result = reader.read_payload(header.length) => match result {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        if header.magic != reader.magic() {
            warn!(peer = %id, magic = ?header.magic, "invalid magic, continuing");
            continue;
        }

        if header.validate_checksum(&payload).is_err() {
            warn!(peer = %id, command = %header.command, "checksum mismatch, continuing");
            continue;
        }

        match decode_message(&header, &payload) {
            Ok(msg) => {
                if events_tx.send(PeerEvent::Message(id, msg)).is_err() {
                    break;
                }
            }
            Err(e) => warn!(peer = %id, command = %header.command, error = %e, "malformed payload"),
        }
    }
    debug!(peer = %id, "read loop exiting");
    let _ = events_tx.send(PeerEvent::Disconnected(id));
}

async fn write_loop(
    mut writer: TcpWriter,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    cancel: Arc<Notify>,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.notified() => break,
            msg = rx.recv() => msg,
        };
        match next {
            Some(bytes) => {
                if writer.write(&bytes).await.is_err() {
                    break;
                }
            }
            None => break,
        }
    }
    writer.shutdown().await;
}
