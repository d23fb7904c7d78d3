//! Shared test helpers for the integration suite: a loopback TCP harness
//! that plays the "remote full node" side of the handshake/sync/filter
//! cycle against a real `ProtocolEngine`, plus small header-chain builders.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use elements_spv::codec::MessageHeader;
use elements_spv::network::{decode_message, encode_message, NetworkMessage, ProtocolEngine};
use elements_spv::node::mempool::MempoolTracker;
use elements_spv::node::sync::HeaderSynchronizer;
use elements_spv::storage::memory::{MemoryFilterStore, MemoryHeaderStore};
use elements_spv::types::{BlockHeader, Hash};

pub const TEST_MAGIC: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Reads one framed message off `stream`, panicking on any I/O or decode
/// failure. Used for assertions the test expects to always succeed.
pub async fn read_message(stream: &mut TcpStream) -> NetworkMessage {
    let mut header_buf = [0u8; 24];
    stream.read_exact(&mut header_buf).await.unwrap();
    let header = MessageHeader::decode(&mut std::io::Cursor::new(header_buf)).unwrap();
    let mut payload = vec![0u8; header.length as usize];
    stream.read_exact(&mut payload).await.unwrap();
    decode_message(&header, &payload).unwrap()
}

/// Best-effort read used only to drain a connection in the background;
/// returns `None` instead of panicking once the peer disconnects.
pub async fn try_read_message(stream: &mut TcpStream) -> Option<NetworkMessage> {
    let mut header_buf = [0u8; 24];
    stream.read_exact(&mut header_buf).await.ok()?;
    let header = MessageHeader::decode(&mut std::io::Cursor::new(header_buf)).ok()?;
    let mut payload = vec![0u8; header.length as usize];
    stream.read_exact(&mut payload).await.ok()?;
    decode_message(&header, &payload).ok()
}

pub async fn write_message(stream: &mut TcpStream, msg: &NetworkMessage) {
    let bytes = encode_message(TEST_MAGIC, msg);
    stream.write_all(&bytes).await.unwrap();
}

/// Drains whatever the engine sends from here on (further `getheaders`
/// rounds, `getcfilters` requests) on a background task so its outbound
/// queue never blocks on a test that stopped reading.
pub fn drain_in_background(mut stream: TcpStream) {
    tokio::spawn(async move { while try_read_message(&mut stream).await.is_some() {} });
}

/// A chain of `count` headers starting at height 1, each linking to the
/// previous one's hash (or `genesis` for the first).
pub fn chained_headers(genesis: Hash, count: u32) -> Vec<BlockHeader> {
    let mut headers = Vec::new();
    let mut prev = genesis;
    for height in 1..=count {
        let header = BlockHeader {
            version: 1,
            prev_block_hash: prev,
            merkle_root: [0u8; 32],
            timestamp: height,
            height,
            proof: vec![],
        };
        prev = header.hash();
        headers.push(header);
    }
    headers
}

/// A fresh `ProtocolEngine` over in-memory stores, plus handles to the
/// stores themselves so tests can assert on what landed in them.
pub fn engine_with_store(
    genesis: Hash,
) -> (Arc<ProtocolEngine>, Arc<MemoryHeaderStore>, Arc<MemoryFilterStore>) {
    let headers_repo = Arc::new(MemoryHeaderStore::new());
    let filters_repo = Arc::new(MemoryFilterStore::new());
    let mempool = MempoolTracker::new(Duration::from_secs(300));
    let sync = Arc::new(HeaderSynchronizer::new(headers_repo.clone(), genesis));
    let engine = ProtocolEngine::new(
        TEST_MAGIC,
        "/elements-spv-test:0.1/",
        genesis,
        headers_repo.clone(),
        filters_repo.clone(),
        mempool,
        sync,
        Duration::from_secs(120),
        Duration::from_secs(60),
    );
    (engine, headers_repo, filters_repo)
}

/// Polls `f` until it returns `true` or `timeout` elapses, returning
/// whether it converged. Used instead of a fixed sleep to wait on
/// background tasks (header monitor, scanner worker) without flaking on
/// slow CI machines.
pub async fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if f() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
