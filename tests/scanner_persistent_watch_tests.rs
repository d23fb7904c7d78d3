//! Cross-height scenarios for the scanner engine, run against the public
//! `Scanner` API rather than through its `#[cfg(test)]` internals.

use std::sync::Arc;

use elements_spv::bip157::{FilterEntry, FilterKey, FilterType};
use elements_spv::bip158::{build_filter, derive_key};
use elements_spv::node::block_service::MockBlockService;
use elements_spv::scanner::{Scanner, WatchItem, WatchOptions};
use elements_spv::storage::memory::{MemoryFilterStore, MemoryHeaderStore};
use elements_spv::storage::{BlockHeaderRepository, FilterRepository};
use elements_spv::types::{Block, BlockHeader, Hash, Transaction, TransactionOutput};

fn header(height: u32, prev: Hash) -> BlockHeader {
    BlockHeader {
        version: 1,
        prev_block_hash: prev,
        merkle_root: [0u8; 32],
        timestamp: height,
        height,
        proof: vec![],
    }
}

fn tx_paying(script: &[u8]) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![],
        outputs: vec![TransactionOutput {
            script_pubkey: script.to_vec(),
            value: vec![],
        }],
        lock_time: 0,
    }
}

async fn install_block(
    headers: &Arc<MemoryHeaderStore>,
    filters: &Arc<MemoryFilterStore>,
    blocks: &Arc<MockBlockService>,
    block: BlockHeader,
    watched_scripts: &[Vec<u8>],
    paying_script: &[u8],
) -> Hash {
    let hash = block.hash();
    headers.write(vec![block.clone()]).await.unwrap();

    let tx = tx_paying(paying_script);
    blocks.insert(Block {
        header: block,
        transactions: vec![tx],
    });

    let key = derive_key(&hash);
    let gcs = build_filter(key, watched_scripts);
    filters
        .put(FilterEntry {
            key: FilterKey::new(hash, FilterType::Regular),
            nbytes: gcs.to_bytes(),
        })
        .await
        .unwrap();
    hash
}

/// A persistent watch re-arms at `matched_height + 1` after each hit, so a
/// script paid twice across two otherwise-unrelated blocks produces two
/// separate reports rather than one.
#[tokio::test]
async fn persistent_watch_reports_twice_across_two_matching_blocks() {
    let headers = Arc::new(MemoryHeaderStore::new());
    let filters = Arc::new(MemoryFilterStore::new());
    let blocks = Arc::new(MockBlockService::new());
    let genesis = [0u8; 32];
    let script = vec![0xaa, 0xbb, 0xcc];

    let mut prev = genesis;
    for height in 1..=6 {
        // Filler blocks in between, whose filters don't include the
        // watched script at all.
        let h = header(height, prev);
        prev = h.hash();
        install_block(&headers, &filters, &blocks, h, &[vec![0x01]], &[0x01]).await;
    }

    let h7 = header(7, prev);
    prev = h7.hash();
    let h7_hash =
        install_block(&headers, &filters, &blocks, h7, &[script.clone()], &script).await;

    let h8 = header(8, prev);
    prev = h8.hash();
    install_block(&headers, &filters, &blocks, h8, &[vec![0x02]], &[0x02]).await;

    let h9 = header(9, prev);
    let h9_hash =
        install_block(&headers, &filters, &blocks, h9, &[script.clone()], &script).await;

    let scanner = Scanner::new(
        headers.clone() as Arc<dyn BlockHeaderRepository>,
        filters.clone() as Arc<dyn FilterRepository>,
        blocks.clone(),
        genesis,
    );
    let mut reports = scanner.start().unwrap();

    scanner
        .watch(
            WatchOptions::new()
                .with_watch_item(WatchItem::Unspent { script })
                .with_start_height(1)
                .with_persistent(),
        )
        .unwrap();

    let first = reports.recv().await.unwrap();
    assert_eq!(first.block_height, 7);
    assert_eq!(first.block_hash, h7_hash);
    assert!(first.request.persistent);

    let second = reports.recv().await.unwrap();
    assert_eq!(second.block_height, 9);
    assert_eq!(second.block_hash, h9_hash);
    assert!(second.request.persistent);

    // No third report shows up from the filler blocks or the chain tip.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(reports.try_recv().is_err());
}

/// A one-shot watch started below the chain tip catches up through every
/// intervening height and still only reports the single match.
#[tokio::test]
async fn one_shot_watch_catches_up_from_behind_the_tip() {
    let headers = Arc::new(MemoryHeaderStore::new());
    let filters = Arc::new(MemoryFilterStore::new());
    let blocks = Arc::new(MockBlockService::new());
    let genesis = [0u8; 32];
    let script = vec![0x10, 0x20];

    let mut prev = genesis;
    for height in 1..=3 {
        let h = header(height, prev);
        prev = h.hash();
        install_block(&headers, &filters, &blocks, h, &[vec![0xff]], &[0xff]).await;
    }
    let h4 = header(4, prev);
    let h4_hash = install_block(&headers, &filters, &blocks, h4, &[script.clone()], &script).await;

    let scanner = Scanner::new(
        headers.clone() as Arc<dyn BlockHeaderRepository>,
        filters.clone() as Arc<dyn FilterRepository>,
        blocks.clone(),
        genesis,
    );
    let mut reports = scanner.start().unwrap();

    scanner
        .watch(
            WatchOptions::new()
                .with_watch_item(WatchItem::Unspent { script })
                .with_start_height(1),
        )
        .unwrap();

    let report = reports.recv().await.unwrap();
    assert_eq!(report.block_height, 4);
    assert_eq!(report.block_hash, h4_hash);
    assert!(!report.request.persistent);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(reports.try_recv().is_err());
}
